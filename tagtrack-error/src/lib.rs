pub mod ingest;
pub mod ledger;
pub mod web;

use anyhow::Error as AnyhowError;
use config::ConfigError;
use ingest::IngestError;
use ledger::LedgerError;
use serde_json::Error as SerdeJsonError;
use std::{error::Error as StdError, io::Error as IoError};
use thiserror::Error;
use tokio::{task::JoinError, time::Duration};
use web::WebError;

pub type TrackResult<T, E = TrackError> = anyhow::Result<T, E>;
pub type WebResult<T, E = WebError> = anyhow::Result<T, E>;
pub type LedgerResult<T, E = LedgerError> = Result<T, E>;

#[derive(Error, Debug, Default)]
pub enum TrackError {
    #[error("service unavailable")]
    #[default]
    ServiceUnavailable,
    #[error("read/write timeout")]
    Timeout(Duration),
    #[error("{0}")]
    JoinError(#[from] JoinError),
    #[error("{0}")]
    StdError(#[from] Box<dyn StdError + Send + Sync>),
    #[error("{0}")]
    IoError(#[from] IoError),
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Anyhow(#[from] AnyhowError),
    #[error("{0}")]
    Json(#[from] SerdeJsonError),
    #[error("{0}")]
    ConfigError(#[from] ConfigError),
    #[error("{0}")]
    IngestError(#[from] IngestError),
    #[error("{0}")]
    LedgerError(#[from] LedgerError),
    #[error("{0}")]
    WebError(#[from] WebError),
    #[error("Initialization error: {0}")]
    InitializationError(String),
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl From<String> for TrackError {
    #[inline]
    fn from(e: String) -> Self {
        TrackError::Msg(e)
    }
}

impl From<&str> for TrackError {
    #[inline]
    fn from(e: &str) -> Self {
        TrackError::Msg(e.to_string())
    }
}
