//! Device query and command endpoints.

use actix_web::{
    web::{self, Data, Json, Path, Query},
    Responder,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tagtrack_error::{web::WebError, WebResult};
use tagtrack_models::web::WebResponse;
use tracing::instrument;

use crate::AppState;

pub(crate) fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/devices", web::get().to(list))
        .route("/devices/{id}", web::get().to(get_by_id))
        .route("/devices/{id}/history", web::get().to(history))
        .route("/devices/{id}/command", web::post().to(command))
        .route("/health", web::get().to(health));
}

#[instrument(skip(state))]
async fn list(state: Data<Arc<AppState>>) -> impl Responder {
    WebResponse::ok(state.registry.list().await)
}

#[instrument(skip(state))]
async fn get_by_id(
    state: Data<Arc<AppState>>,
    id: Path<String>,
) -> WebResult<impl Responder> {
    match state.registry.get(&id).await {
        Some(device) => Ok(WebResponse::ok(device)),
        None => Err(WebError::NotFound(format!("device {id}"))),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[instrument(skip(state))]
async fn history(
    state: Data<Arc<AppState>>,
    id: Path<String>,
    params: Query<HistoryParams>,
) -> impl Responder {
    // Unknown devices yield an empty history, not a 404: the registry is
    // built reactively from traffic.
    WebResponse::ok(state.store.history(&id, params.limit).await)
}

#[instrument(skip(state))]
async fn health(state: Data<Arc<AppState>>) -> impl Responder {
    WebResponse::ok(state.registry.health().await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    command: String,
    #[serde(default)]
    payload: Map<String, Value>,
}

#[instrument(skip(state, body))]
async fn command(
    state: Data<Arc<AppState>>,
    id: Path<String>,
    body: Json<CommandRequest>,
) -> WebResult<impl Responder> {
    let body = body.into_inner();
    state
        .dispatcher
        .send(&id, &body.command, body.payload)
        .await?;
    Ok(WebResponse::<()>::ok_empty())
}
