//! Ledger-backed asset endpoints and local sighting queries.
//!
//! The create/query/transfer routes are thin pass-throughs to the ledger
//! gateway: a submit for state changes, an evaluate for reads. Nothing
//! is cached locally, so a query right after a create reflects the
//! committed ledger state, not this process's memory.

use actix_web::{
    web::{self, Data, Json, Path},
    Responder,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tagtrack_error::{web::WebError, WebResult};
use tagtrack_models::web::WebResponse;
use tracing::instrument;

use crate::AppState;

pub(crate) fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/assets", web::post().to(create))
        .route("/assets", web::get().to(list))
        .route("/assets/{id}", web::get().to(get_by_id))
        .route("/assets/{id}/transfer", web::post().to(transfer))
        .route("/sightings", web::get().to(sightings))
        .route("/sightings/{tag_id}", web::get().to(sighting_by_tag));
}

/// Decode a contract result as JSON where possible, falling back to a
/// plain string for contracts that return raw text.
fn contract_value(raw: Vec<u8>) -> Value {
    serde_json::from_slice(&raw)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw).into_owned()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAsset {
    asset_id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    owner: String,
}

#[instrument(skip(state, body))]
async fn create(
    state: Data<Arc<AppState>>,
    body: Json<CreateAsset>,
) -> WebResult<impl Responder> {
    let body = body.into_inner();
    if body.asset_id.is_empty() {
        return Err(WebError::BadRequest("assetId must not be empty".into()));
    }
    let raw = state
        .ledger
        .submit(
            "createAsset",
            &[body.asset_id, body.description, body.owner],
        )
        .await?;
    Ok(WebResponse::ok(contract_value(raw)))
}

#[instrument(skip(state))]
async fn list(state: Data<Arc<AppState>>) -> WebResult<impl Responder> {
    let raw = state.ledger.evaluate("queryAllAssets", &[]).await?;
    Ok(WebResponse::ok(contract_value(raw)))
}

#[instrument(skip(state))]
async fn get_by_id(
    state: Data<Arc<AppState>>,
    id: Path<String>,
) -> WebResult<impl Responder> {
    let raw = state
        .ledger
        .evaluate("queryAsset", &[id.into_inner()])
        .await?;
    Ok(WebResponse::ok(contract_value(raw)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferAsset {
    new_owner: String,
}

#[instrument(skip(state, body))]
async fn transfer(
    state: Data<Arc<AppState>>,
    id: Path<String>,
    body: Json<TransferAsset>,
) -> WebResult<impl Responder> {
    let raw = state
        .ledger
        .submit("transferAsset", &[id.into_inner(), body.into_inner().new_owner])
        .await?;
    Ok(WebResponse::ok(contract_value(raw)))
}

#[instrument(skip(state))]
async fn sightings(state: Data<Arc<AppState>>) -> impl Responder {
    WebResponse::ok(state.assets.list().await)
}

#[instrument(skip(state))]
async fn sighting_by_tag(
    state: Data<Arc<AppState>>,
    tag_id: Path<String>,
) -> WebResult<impl Responder> {
    match state.assets.find(&tag_id).await {
        Some(record) => Ok(WebResponse::ok(record)),
        None => Err(WebError::NotFound(format!("tag {tag_id}"))),
    }
}
