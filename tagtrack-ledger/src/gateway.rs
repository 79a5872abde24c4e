//! Submit/evaluate gateway with call-scoped sessions.

use std::sync::Arc;
use std::time::Duration;
use tagtrack_error::ledger::LedgerError;
use tagtrack_error::LedgerResult;
use tagtrack_models::constants::APP_IDENTITY;
use tagtrack_models::settings::Ledger as LedgerConfig;
use tracing::{debug, instrument};

use crate::{connector::LedgerConnector, profile::ConnectionProfile, wallet::FileWallet};

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Submit,
    Evaluate,
}

/// Gateway to the ledger network.
///
/// Every call loads the application identity, opens a fresh session,
/// invokes, and closes the session whatever happens. Nothing is cached
/// between calls: concurrent calls proceed independently and each pays
/// full connection-setup cost, which keeps the concurrency story
/// trivial. The underlying session is not documented thread-safe.
pub struct LedgerGateway {
    connector: Arc<dyn LedgerConnector>,
    wallet: Arc<FileWallet>,
    profile: ConnectionProfile,
    config: LedgerConfig,
}

impl LedgerGateway {
    pub fn new(
        connector: Arc<dyn LedgerConnector>,
        wallet: Arc<FileWallet>,
        profile: ConnectionProfile,
        config: LedgerConfig,
    ) -> Self {
        Self {
            connector,
            wallet,
            profile,
            config,
        }
    }

    /// State-changing invocation.
    #[instrument(skip(self, args))]
    pub async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.invoke(CallKind::Submit, function, args).await
    }

    /// Read-only invocation.
    #[instrument(skip(self, args))]
    pub async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.invoke(CallKind::Evaluate, function, args).await
    }

    async fn invoke(
        &self,
        kind: CallKind,
        function: &str,
        args: &[String],
    ) -> LedgerResult<Vec<u8>> {
        let identity = self
            .wallet
            .get(APP_IDENTITY)
            .await?
            .ok_or_else(|| LedgerError::IdentityNotEnrolled(APP_IDENTITY.to_string()))?;

        let session = self
            .connector
            .connect(
                &self.profile,
                &identity,
                &self.config.channel,
                &self.config.contract,
            )
            .await?;

        let timeout = Duration::from_millis(self.config.call_timeout_ms);
        let result = tokio::time::timeout(timeout, async {
            match kind {
                CallKind::Submit => session.submit(function, args).await,
                CallKind::Evaluate => session.evaluate(function, args).await,
            }
        })
        .await;

        // Session cleanup is unconditional: success, business rejection,
        // transport error and timeout all pass through here.
        session.close().await;

        match result {
            Ok(inner) => {
                debug!(function = %function, ok = inner.is_ok(), "ledger call finished");
                inner
            }
            Err(_) => Err(LedgerError::Timeout(self.config.call_timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::LedgerSession;
    use crate::wallet::LedgerIdentity;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stub ledger backend: a world-state map shared by all sessions,
    /// so a submit is visible to the next evaluate the way a real
    /// ledger's committed state is.
    #[derive(Default)]
    struct StubBackend {
        state: Mutex<HashMap<String, String>>,
        opened: AtomicUsize,
        closed: AtomicUsize,
        fail_submit: bool,
        hang: bool,
    }

    struct StubConnector {
        backend: Arc<StubBackend>,
    }

    struct StubSession {
        backend: Arc<StubBackend>,
    }

    #[async_trait]
    impl LedgerConnector for StubConnector {
        async fn connect(
            &self,
            _profile: &ConnectionProfile,
            _identity: &LedgerIdentity,
            _channel: &str,
            _contract: &str,
        ) -> LedgerResult<Box<dyn LedgerSession>> {
            self.backend.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubSession {
                backend: Arc::clone(&self.backend),
            }))
        }
    }

    #[async_trait]
    impl LedgerSession for StubSession {
        async fn evaluate(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
            match function {
                "queryAsset" => {
                    let state = self.backend.state.lock().unwrap();
                    match state.get(&args[0]) {
                        Some(value) => Ok(value.clone().into_bytes()),
                        None => Err(LedgerError::ContractRejected {
                            function: function.to_string(),
                            detail: format!("asset {} does not exist", args[0]),
                        }),
                    }
                }
                other => Err(LedgerError::ContractRejected {
                    function: other.to_string(),
                    detail: "unknown function".into(),
                }),
            }
        }

        async fn submit(&self, function: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
            if self.backend.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.backend.fail_submit {
                return Err(LedgerError::Transport("endorsement unreachable".into()));
            }
            match function {
                "createAsset" => {
                    let mut state = self.backend.state.lock().unwrap();
                    state.insert(args[0].clone(), format!("asset:{}", args[0]));
                    Ok(Vec::new())
                }
                other => Err(LedgerError::ContractRejected {
                    function: other.to_string(),
                    detail: "unknown function".into(),
                }),
            }
        }

        async fn close(&self) {
            self.backend.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn profile() -> ConnectionProfile {
        serde_json::from_str(
            r#"{
                "name": "stub",
                "organizations": {
                    "AssetOrg": {
                        "mspid": "AssetOrgMSP",
                        "peers": ["peer0"],
                        "certificateAuthorities": ["ca0"]
                    }
                },
                "peers": { "peer0": { "url": "https://stub:7051" } },
                "certificateAuthorities": { "ca0": { "url": "https://stub:7054" } }
            }"#,
        )
        .unwrap()
    }

    async fn gateway_with(backend: Arc<StubBackend>) -> (LedgerGateway, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Arc::new(FileWallet::new(dir.path()));
        wallet
            .put(
                APP_IDENTITY,
                &LedgerIdentity {
                    msp_id: "AssetOrgMSP".into(),
                    certificate: "cert".into(),
                    private_key: "key".into(),
                },
            )
            .await
            .unwrap();

        let mut config = LedgerConfig::default();
        config.call_timeout_ms = 200;
        let gateway = LedgerGateway::new(
            Arc::new(StubConnector { backend }),
            wallet,
            profile(),
            config,
        );
        (gateway, dir)
    }

    #[tokio::test]
    async fn submit_is_visible_to_subsequent_evaluate() {
        let backend = Arc::new(StubBackend::default());
        let (gateway, _dir) = gateway_with(Arc::clone(&backend)).await;

        gateway
            .submit("createAsset", &["A1".to_string()])
            .await
            .unwrap();
        let value = gateway
            .evaluate("queryAsset", &["A1".to_string()])
            .await
            .unwrap();
        assert_eq!(value, b"asset:A1");

        // Two calls, two sessions: nothing was reused
        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(backend.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_closes_on_success_and_on_failure() {
        let backend = Arc::new(StubBackend {
            fail_submit: true,
            ..Default::default()
        });
        let (gateway, _dir) = gateway_with(Arc::clone(&backend)).await;

        let err = gateway
            .submit("createAsset", &["A1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
        assert!(err.is_retryable());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_closes_on_timeout() {
        let backend = Arc::new(StubBackend {
            hang: true,
            ..Default::default()
        });
        let (gateway, _dir) = gateway_with(Arc::clone(&backend)).await;

        let err = gateway
            .submit("createAsset", &["A1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_retryable());
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_is_not_retryable() {
        let backend = Arc::new(StubBackend::default());
        let (gateway, _dir) = gateway_with(Arc::clone(&backend)).await;

        let err = gateway
            .evaluate("queryAsset", &["missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ContractRejected { .. }));
        assert!(!err.is_retryable());
        assert_eq!(backend.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_enrollment_fails_before_any_session() {
        let backend = Arc::new(StubBackend::default());
        let dir = tempfile::tempdir().unwrap();
        let gateway = LedgerGateway::new(
            Arc::new(StubConnector {
                backend: Arc::clone(&backend),
            }),
            Arc::new(FileWallet::new(dir.path())),
            profile(),
            LedgerConfig::default(),
        );

        let err = gateway
            .evaluate("queryAsset", &["A1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::IdentityNotEnrolled(_)));
        assert_eq!(backend.opened.load(Ordering::SeqCst), 0);
    }
}
