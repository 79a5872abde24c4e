use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::{ingest::IngestError, ledger::LedgerError, TrackError};

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("BadRequest: `{0}`")]
    BadRequest(String),
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("ServiceUnavailable: `{0}`")]
    ServiceUnavailable(String),
    #[error("UpstreamError: `{0}`")]
    UpstreamError(String),
    #[error("Rejected: `{0}`")]
    Rejected(String),
    #[error("InternalError: `{0}`")]
    InternalError(String),
}

impl From<TrackError> for WebError {
    fn from(e: TrackError) -> Self {
        match e {
            TrackError::IngestError(IngestError::CommandUnavailable) => {
                WebError::ServiceUnavailable("broker is not connected".into())
            }
            TrackError::LedgerError(e) => e.into(),
            other => WebError::InternalError(other.to_string()),
        }
    }
}

impl From<IngestError> for WebError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::CommandUnavailable => {
                WebError::ServiceUnavailable("broker is not connected".into())
            }
            other => WebError::InternalError(other.to_string()),
        }
    }
}

/// Map the ledger failure taxonomy onto HTTP semantics: retryable
/// transport failures surface as 502, business rejections as 422,
/// missing enrollment as 503 (the provisioner gate should have fired).
impl From<LedgerError> for WebError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ContractRejected { .. } => WebError::Rejected(e.to_string()),
            LedgerError::Transport(_) | LedgerError::Timeout(_) => {
                WebError::UpstreamError(e.to_string())
            }
            LedgerError::IdentityNotEnrolled(_) => WebError::ServiceUnavailable(e.to_string()),
            other => WebError::InternalError(other.to_string()),
        }
    }
}

impl ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "message": self.to_string()
        });
        match self {
            WebError::Unauthorized => {
                body["error"] = json!("Unauthorized");
                HttpResponse::Unauthorized().json(body)
            }
            WebError::BadRequest(_) => {
                body["error"] = json!("Bad Request");
                HttpResponse::BadRequest().json(body)
            }
            WebError::NotFound(_) => {
                body["error"] = json!("Not Found");
                HttpResponse::NotFound().json(body)
            }
            WebError::ServiceUnavailable(_) => {
                body["error"] = json!("Service Unavailable");
                HttpResponse::ServiceUnavailable().json(body)
            }
            WebError::UpstreamError(_) => {
                body["error"] = json!("Bad Gateway");
                HttpResponse::BadGateway().json(body)
            }
            WebError::Rejected(_) => {
                body["error"] = json!("Unprocessable Entity");
                HttpResponse::UnprocessableEntity().json(body)
            }
            WebError::InternalError(_) => {
                body["error"] = json!("Internal Server Error");
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}
