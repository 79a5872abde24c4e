//! Broker ingestion adapter.
//!
//! A supervisor task owns the MQTT connection lifecycle: it connects,
//! subscribes to the three inbound topic families, drives the event loop,
//! and on any transport failure tears down and reconnects with capped
//! exponential backoff, indefinitely. Device traffic resumes whenever the
//! field does, so there is no terminal failure state.
//!
//! All decoded messages flow through one path ([`handle_publish`]) that
//! updates the registry and telemetry store and fans out on the event
//! bus. A malformed message is logged and dropped there; it never stops
//! the adapter or the messages behind it.

pub mod codec;
pub mod commands;

use arc_swap::ArcSwapOption;
use backoff::backoff::Backoff;
use chrono::Utc;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tagtrack_common::AssetStore;
use tagtrack_error::ingest::IngestError;
use tagtrack_models::constants::{KIND_NFC, KIND_STATUS, KIND_TELEMETRY};
use tagtrack_models::retry::build_exponential_backoff;
use tagtrack_models::{Settings, TelemetrySample, TrackEvent};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{bus::EventBus, registry::DeviceRegistry, telemetry::TelemetryStore};
use codec::MessageKind;

/// Connection state of the ingestion adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestState::Disconnected => write!(f, "disconnected"),
            IngestState::Connecting => write!(f, "connecting"),
            IngestState::Connected => write!(f, "connected"),
        }
    }
}

/// Shared client entry for lock-free access by the command dispatcher.
///
/// The supervisor owns the lifecycle and swaps the client in and out on
/// connection and disconnection.
pub struct ClientEntry {
    client: ArcSwapOption<AsyncClient>,
    healthy: AtomicBool,
}

impl ClientEntry {
    fn new_empty() -> Self {
        Self {
            client: ArcSwapOption::from(None),
            healthy: AtomicBool::new(false),
        }
    }

    /// Current client if the connection is up.
    pub fn live(&self) -> Option<Arc<AsyncClient>> {
        if !self.healthy.load(Ordering::Acquire) {
            return None;
        }
        self.client.load_full()
    }

    fn set_connected(&self, client: Arc<AsyncClient>) {
        self.client.store(Some(client));
        self.healthy.store(true, Ordering::Release);
    }

    fn set_disconnected(&self) {
        self.client.store(None);
        self.healthy.store(false, Ordering::Release);
    }
}

/// Everything one inbound message may touch.
#[derive(Clone)]
pub struct IngestContext {
    pub registry: Arc<DeviceRegistry>,
    pub store: Arc<TelemetryStore>,
    pub bus: Arc<EventBus>,
    pub assets: Arc<dyn AssetStore>,
}

/// Supervisor for the broker connection.
pub struct IngestSupervisor {
    settings: Settings,
    ctx: IngestContext,
    shared_client: Arc<ClientEntry>,
    state_tx: watch::Sender<IngestState>,
    state_rx: watch::Receiver<IngestState>,
}

impl IngestSupervisor {
    pub fn new(settings: Settings, ctx: IngestContext) -> Self {
        let (state_tx, state_rx) = watch::channel(IngestState::Disconnected);
        Self {
            settings,
            ctx,
            shared_client: Arc::new(ClientEntry::new_empty()),
            state_tx,
            state_rx,
        }
    }

    /// Handle to the live client for outbound publishes.
    pub fn shared_client(&self) -> Arc<ClientEntry> {
        Arc::clone(&self.shared_client)
    }

    /// Watch the adapter's connection state.
    pub fn state(&self) -> watch::Receiver<IngestState> {
        self.state_rx.clone()
    }

    /// Run the connect/subscribe/poll/reconnect loop until cancelled.
    ///
    /// Reconnection never gives up: backoff grows exponentially up to the
    /// configured interval cap and resets after any successful connection.
    pub fn run(self, cancel: CancellationToken) {
        let cfg = self.settings.broker.clone();
        let ctx = self.ctx.clone();
        let shared_client = Arc::clone(&self.shared_client);
        let state_tx = self.state_tx.clone();

        tokio::spawn(async move {
            let mut bo = build_exponential_backoff(&cfg.reconnect);

            loop {
                if cancel.is_cancelled() {
                    break;
                }

                let _ = state_tx.send(IngestState::Connecting);
                info!(host = %cfg.host, port = cfg.port, "connecting to broker");

                let mut options =
                    MqttOptions::new(client_id(&cfg.client_id), cfg.host.clone(), cfg.port);
                options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
                if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
                    options.set_credentials(user.clone(), pass.clone());
                }
                let (client, mut event_loop) = AsyncClient::new(options, cfg.channel_capacity);

                let seen_active = run_event_loop(
                    &client,
                    &mut event_loop,
                    &cfg.namespace,
                    &ctx,
                    &cancel,
                    &state_tx,
                    &shared_client,
                )
                .await;

                shared_client.set_disconnected();
                let _ = state_tx.send(IngestState::Disconnected);

                if cancel.is_cancelled() {
                    break;
                }
                if seen_active {
                    bo.reset();
                }

                // The policy has no attempt or elapsed-time cap, so
                // next_backoff always yields a delay.
                let delay = bo
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(cfg.reconnect.max_interval_ms));
                info!(delay_ms = delay.as_millis() as u64, "broker reconnect backoff");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            info!("ingestion supervisor stopped");
        });
    }
}

/// Poll the connection until it fails or the supervisor is cancelled.
///
/// Returns whether the connection ever reached Connected, which resets
/// the reconnect backoff.
async fn run_event_loop(
    client: &AsyncClient,
    event_loop: &mut rumqttc::EventLoop,
    namespace: &str,
    ctx: &IngestContext,
    cancel: &CancellationToken,
    state_tx: &watch::Sender<IngestState>,
    shared_client: &Arc<ClientEntry>,
) -> bool {
    let mut seen_active = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("event loop cancelled, disconnecting");
                let _ = client.disconnect().await;
                return seen_active;
            }
            result = event_loop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("broker connection established");
                        seen_active = true;
                        shared_client.set_connected(Arc::new(client.clone()));
                        let _ = state_tx.send(IngestState::Connected);

                        if let Err(e) = subscribe_inbound(client, namespace).await {
                            // Subscription failure makes the connection
                            // useless; force a reconnect cycle.
                            warn!(error = %e, "failed to subscribe inbound topics");
                            let _ = client.disconnect().await;
                            return seen_active;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Err(e) =
                            handle_publish(ctx, namespace, &publish.topic, &publish.payload).await
                        {
                            // Contained: log and move on to the next message.
                            warn!(topic = %publish.topic, error = %e, "discarding inbound message");
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("broker sent disconnect");
                        return seen_active;
                    }
                    Ok(event) => {
                        debug!(?event, "broker event");
                    }
                    Err(e) => {
                        warn!(error = %e, "broker transport error");
                        return seen_active;
                    }
                }
            }
        }
    }
}

/// Subscribe to the three inbound topic families, wildcard on entity id.
async fn subscribe_inbound(client: &AsyncClient, namespace: &str) -> Result<(), IngestError> {
    for kind in [KIND_TELEMETRY, KIND_STATUS, KIND_NFC] {
        let topic = format!("{namespace}/+/{kind}");
        client
            .subscribe(topic.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|e| IngestError::TransportDisconnected(e.to_string()))?;
        debug!(topic = %topic, "subscribed");
    }
    Ok(())
}

/// Decode one inbound message and apply it to shared state.
///
/// This is the single writer path for the registry and telemetry store.
/// Foreign topics are ignored silently; malformed payloads come back as
/// `MalformedMessage` for the caller to log. Neither variant ever
/// propagates past the event loop.
pub async fn handle_publish(
    ctx: &IngestContext,
    namespace: &str,
    topic: &str,
    payload: &[u8],
) -> Result<(), IngestError> {
    let Some((entity, kind)) = codec::parse_topic(namespace, topic) else {
        debug!(topic = %topic, "ignoring foreign topic");
        return Ok(());
    };

    let fields = codec::decode_payload(topic, payload)?;
    let patch = codec::patch_from_payload(kind, topic, &fields)?;
    let device = ctx.registry.upsert(entity, patch).await;
    let now = Utc::now();
    let payload_value = serde_json::Value::Object(fields);

    let event = match kind {
        MessageKind::Telemetry => {
            ctx.store
                .append(
                    entity,
                    TelemetrySample {
                        device_id: entity.to_string(),
                        payload: payload_value.clone(),
                        received_at: now,
                    },
                )
                .await;
            TrackEvent::Telemetry {
                device_id: entity.to_string(),
                payload: payload_value,
                timestamp: now,
            }
        }
        MessageKind::Status => TrackEvent::Status {
            device_id: entity.to_string(),
            status: device.status,
            payload: payload_value,
            timestamp: now,
        },
        MessageKind::Nfc => {
            if let Some(tag_id) = payload_value.get("tagId").and_then(|v| v.as_str()) {
                ctx.assets.record_sighting(tag_id, entity, now).await;
            }
            TrackEvent::NfcScan {
                reader_id: entity.to_string(),
                payload: payload_value,
                timestamp: now,
            }
        }
    };

    ctx.bus.publish(event);
    Ok(())
}

/// Client id with a short random suffix so replicas never collide.
fn client_id(prefix: &str) -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &short[..8])
}
