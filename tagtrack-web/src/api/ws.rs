//! Observer event stream.
//!
//! Path: `GET /api/ws/events`
//!
//! On upgrade the session subscribes to all three event categories and
//! forwards every event as one JSON text frame until the client closes
//! or the socket errors. The bus receivers live on the session loop's
//! stack, so ending the loop drops all three: disconnect promptly
//! unsubscribes, and repeated connect/disconnect cycles leave nothing
//! behind.

use actix_web::{web::Data, Error as ActixError, HttpRequest, HttpResponse};
use actix_ws::{Message as WsMessage, Session};
use futures::StreamExt;
use std::sync::Arc;
use tagtrack_models::{EventCategory, TrackEvent};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

use crate::AppState;

/// Handle WebSocket upgrades for `/api/ws/events`.
#[instrument(skip_all)]
pub(crate) async fn events_ws(
    req: HttpRequest,
    body: actix_web::web::Payload,
    state: Data<Arc<AppState>>,
) -> Result<HttpResponse, ActixError> {
    let (res, session, msg_stream) = actix_ws::handle(&req, body)?;
    let state: Arc<AppState> = state.get_ref().clone();

    actix_rt::spawn(async move {
        stream_events(state, session, msg_stream).await;
    });

    Ok(res)
}

/// Core session loop: fan-in from the three bus categories, fan-out to
/// one observer connection.
async fn stream_events(
    state: Arc<AppState>,
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
) {
    let mut telemetry = state.bus.subscribe(EventCategory::Telemetry);
    let mut status = state.bus.subscribe(EventCategory::Status);
    let mut scans = state.bus.subscribe(EventCategory::NfcScan);

    loop {
        tokio::select! {
            item = msg_stream.next() => {
                match item {
                    Some(Ok(WsMessage::Close(reason))) => {
                        info!(?reason, "observer closed event stream");
                        break;
                    }
                    Some(Ok(WsMessage::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // The stream is server-push only; inbound text and
                        // binary frames are ignored.
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "event stream socket error");
                        break;
                    }
                    None => break,
                }
            }
            event = telemetry.recv() => {
                if !forward(&mut session, event).await { break; }
            }
            event = status.recv() => {
                if !forward(&mut session, event).await { break; }
            }
            event = scans.recv() => {
                if !forward(&mut session, event).await { break; }
            }
        }
    }

    let _ = session.close(None).await;
    // Receivers drop here; the bus forgets this observer immediately.
}

/// Serialize one event onto the observer connection.
///
/// Returns false when the session is gone and the loop should end. A lag
/// means this observer was too slow and lost its oldest buffered events;
/// delivery continues from the oldest retained one.
async fn forward(
    session: &mut Session,
    event: Result<Arc<TrackEvent>, RecvError>,
) -> bool {
    let event = match event {
        Ok(event) => event,
        Err(RecvError::Lagged(missed)) => {
            warn!(missed, "observer lagging, dropped oldest events");
            return true;
        }
        Err(RecvError::Closed) => return false,
    };

    let text = match serde_json::to_string(event.as_ref()) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to serialize event");
            return true;
        }
    };
    session.text(text).await.is_ok()
}
