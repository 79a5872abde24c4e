//! Connector seam between the gateway and the ledger network.
//!
//! The core defines the contract it requires of the external network: a
//! connector opens a session bound to one channel and one contract, the
//! session runs submit/evaluate invocations, and the session is closed
//! by the caller on every exit path. Sessions are never shared, pooled
//! or cached across calls.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tagtrack_error::ledger::LedgerError;
use tagtrack_error::LedgerResult;
use tracing::{debug, trace};

use crate::{profile::ConnectionProfile, wallet::LedgerIdentity};

#[async_trait]
pub trait LedgerSession: Send + Sync {
    /// Read-only invocation; no ledger state change.
    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>>;

    /// State-changing invocation, eventually reflected in ledger-backed
    /// queries.
    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>>;

    /// Release the session. Must be called on every exit path.
    async fn close(&self);
}

#[async_trait]
pub trait LedgerConnector: Send + Sync + 'static {
    /// Open a fresh session for one invocation, resolving the target
    /// contract within the given channel.
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        identity: &LedgerIdentity,
        channel: &str,
        contract: &str,
    ) -> LedgerResult<Box<dyn LedgerSession>>;
}

/// JSON-over-HTTPS connector to a gateway-peer bridge.
///
/// The enrolled identity's certificate and key authenticate the session
/// as a TLS client identity; the bridge maps that to the ledger identity
/// performing the transaction.
pub struct HttpConnector {
    connect_timeout: Duration,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl LedgerConnector for HttpConnector {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        identity: &LedgerIdentity,
        channel: &str,
        contract: &str,
    ) -> LedgerResult<Box<dyn LedgerSession>> {
        let endpoint = profile.gateway_endpoint(&identity.msp_id)?.to_string();

        let pem_bundle = format!("{}{}", identity.private_key, identity.certificate);
        let tls_identity = reqwest::Identity::from_pem(pem_bundle.as_bytes())
            .map_err(|e| LedgerError::Transport(format!("client identity: {e}")))?;

        let client = reqwest::Client::builder()
            .identity(tls_identity)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("session setup: {e}")))?;

        debug!(endpoint = %endpoint, channel = %channel, contract = %contract, "ledger session opened");
        Ok(Box::new(HttpSession {
            client,
            endpoint,
            channel: channel.to_string(),
            contract: contract.to_string(),
        }))
    }
}

struct HttpSession {
    client: reqwest::Client,
    endpoint: String,
    channel: String,
    contract: String,
}

#[derive(Serialize)]
struct InvocationBody<'a> {
    function: &'a str,
    args: &'a [String],
}

impl HttpSession {
    async fn invoke(&self, op: &str, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        let url = format!(
            "{}/channels/{}/contracts/{}/{}",
            self.endpoint, self.channel, self.contract, op
        );
        let response = self
            .client
            .post(&url)
            .json(&InvocationBody { function, args })
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }
        if status.is_client_error() {
            // The peer executed the invocation and the contract said no.
            let detail = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(LedgerError::ContractRejected {
                function: function.to_string(),
                detail,
            });
        }
        Err(LedgerError::Transport(format!(
            "{op} `{function}` failed with status {status}"
        )))
    }
}

#[async_trait]
impl LedgerSession for HttpSession {
    async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.invoke("evaluate", function, args).await
    }

    async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.invoke("submit", function, args).await
    }

    async fn close(&self) {
        // Connections are dropped with the per-session client; nothing to
        // flush. The hook stays so callers release on every exit path.
        trace!(endpoint = %self.endpoint, "ledger session closed");
    }
}
