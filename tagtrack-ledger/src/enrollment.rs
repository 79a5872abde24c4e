//! Startup identity provisioning against the network's certificate
//! authority.
//!
//! Each identity walks Absent → Enrolling → Present exactly once. The
//! administrative identity enrolls directly with the pre-shared
//! bootstrap secret; the application identity is first registered under
//! the administrative context, then enrolled. Any failure is fatal: the
//! process must not serve ledger-dependent traffic on a half-provisioned
//! wallet, and credential problems need an operator, not a retry loop.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rcgen::{CertificateParams, DnType, KeyPair};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tagtrack_error::ledger::LedgerError;
use tagtrack_error::LedgerResult;
use tagtrack_models::constants::{ADMIN_IDENTITY, APP_IDENTITY};
use tagtrack_models::settings::Ledger as LedgerConfig;
use tracing::{info, instrument};

use crate::{profile::ConnectionProfile, wallet::FileWallet, wallet::LedgerIdentity};

/// Certificate authority operations the provisioner needs.
#[async_trait]
pub trait CaApi: Send + Sync + 'static {
    /// Exchange an enrollment id/secret and a CSR for a signed
    /// certificate (PEM).
    async fn enroll(
        &self,
        enrollment_id: &str,
        secret: &str,
        csr_pem: &str,
    ) -> LedgerResult<String>;

    /// Register a new enrollment id under the registrar's authority,
    /// returning the enrollment secret for it.
    async fn register(
        &self,
        registrar_id: &str,
        registrar_secret: &str,
        enrollment_id: &str,
    ) -> LedgerResult<String>;
}

/// REST client for the certificate authority.
pub struct HttpCaClient {
    client: reqwest::Client,
    url: String,
    ca_name: String,
}

#[derive(Serialize)]
struct EnrollRequest<'a> {
    certificate_request: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    caname: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    id: &'a str,
    r#type: &'a str,
    affiliation: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    caname: &'a str,
}

#[derive(Deserialize)]
struct CaResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Vec<Value>,
}

impl HttpCaClient {
    /// Build a client for the organization's CA from the profile.
    pub fn from_profile(profile: &ConnectionProfile, msp_id: &str) -> LedgerResult<Self> {
        let ca = profile.certificate_authority(msp_id)?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: ca.url.clone(),
            ca_name: ca.ca_name.clone(),
        })
    }

    async fn post(
        &self,
        path: &str,
        user: &str,
        secret: &str,
        body: &impl Serialize,
    ) -> LedgerResult<Value> {
        let url = format!("{}{}", self.url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(user, Some(secret))
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        let parsed: CaResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("invalid CA response: {e}")))?;

        if !status.is_success() || !parsed.success {
            let detail = parsed
                .errors
                .first()
                .and_then(|e| e.get("message").and_then(Value::as_str))
                .map(String::from)
                .unwrap_or_else(|| format!("CA returned status {status}"));
            return Err(LedgerError::Transport(detail));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl CaApi for HttpCaClient {
    async fn enroll(
        &self,
        enrollment_id: &str,
        secret: &str,
        csr_pem: &str,
    ) -> LedgerResult<String> {
        let result = self
            .post(
                "/api/v1/enroll",
                enrollment_id,
                secret,
                &EnrollRequest {
                    certificate_request: csr_pem,
                    caname: &self.ca_name,
                },
            )
            .await?;

        let encoded = result
            .get("Cert")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Transport("enroll response without Cert".into()))?;
        let pem = BASE64
            .decode(encoded)
            .map_err(|e| LedgerError::Transport(format!("certificate decode: {e}")))?;
        String::from_utf8(pem)
            .map_err(|e| LedgerError::Transport(format!("certificate encoding: {e}")))
    }

    async fn register(
        &self,
        registrar_id: &str,
        registrar_secret: &str,
        enrollment_id: &str,
    ) -> LedgerResult<String> {
        let result = self
            .post(
                "/api/v1/register",
                registrar_id,
                registrar_secret,
                &RegisterRequest {
                    id: enrollment_id,
                    r#type: "client",
                    affiliation: "",
                    caname: &self.ca_name,
                },
            )
            .await?;

        result
            .get("secret")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| LedgerError::Transport("register response without secret".into()))
    }
}

/// Generate a fresh key pair and certificate signing request.
fn generate_csr(common_name: &str) -> LedgerResult<(String, String)> {
    let key_pair = KeyPair::generate()
        .map_err(|e| LedgerError::Wallet(format!("key generation: {e}")))?;
    let mut params = CertificateParams::new(Vec::new())
        .map_err(|e| LedgerError::Wallet(format!("csr params: {e}")))?;
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    let csr = params
        .serialize_request(&key_pair)
        .map_err(|e| LedgerError::Wallet(format!("csr serialization: {e}")))?;
    let csr_pem = csr
        .pem()
        .map_err(|e| LedgerError::Wallet(format!("csr encoding: {e}")))?;
    Ok((csr_pem, key_pair.serialize_pem()))
}

/// Runs once during startup, before any ledger gateway call.
pub struct IdentityProvisioner<C: CaApi> {
    ca: C,
    wallet: Arc<FileWallet>,
    config: LedgerConfig,
}

impl<C: CaApi> IdentityProvisioner<C> {
    pub fn new(ca: C, wallet: Arc<FileWallet>, config: LedgerConfig) -> Self {
        Self { ca, wallet, config }
    }

    /// Ensure both well-known identities exist in the wallet.
    #[instrument(skip(self))]
    pub async fn ensure_identities(&self) -> LedgerResult<()> {
        self.ensure_admin().await?;
        self.ensure_app().await?;
        Ok(())
    }

    async fn ensure_admin(&self) -> LedgerResult<()> {
        if self.wallet.exists(ADMIN_IDENTITY).await {
            info!(identity = ADMIN_IDENTITY, "credential present");
            return Ok(());
        }

        info!(identity = ADMIN_IDENTITY, "credential absent, enrolling");
        let (csr_pem, key_pem) = generate_csr(&self.config.admin_id).map_err(|e| fatal(ADMIN_IDENTITY, e))?;
        let certificate = self
            .ca
            .enroll(&self.config.admin_id, &self.config.admin_secret, &csr_pem)
            .await
            .map_err(|e| fatal(ADMIN_IDENTITY, e))?;

        self.wallet
            .put(
                ADMIN_IDENTITY,
                &LedgerIdentity {
                    msp_id: self.config.msp_id.clone(),
                    certificate,
                    private_key: key_pem,
                },
            )
            .await
            .map_err(|e| fatal(ADMIN_IDENTITY, e))?;
        info!(identity = ADMIN_IDENTITY, "credential enrolled and stored");
        Ok(())
    }

    async fn ensure_app(&self) -> LedgerResult<()> {
        if self.wallet.exists(APP_IDENTITY).await {
            info!(identity = APP_IDENTITY, "credential present");
            return Ok(());
        }

        info!(identity = APP_IDENTITY, "credential absent, registering and enrolling");
        let secret = self
            .ca
            .register(&self.config.admin_id, &self.config.admin_secret, APP_IDENTITY)
            .await
            .map_err(|e| fatal(APP_IDENTITY, e))?;

        let (csr_pem, key_pem) = generate_csr(APP_IDENTITY).map_err(|e| fatal(APP_IDENTITY, e))?;
        let certificate = self
            .ca
            .enroll(APP_IDENTITY, &secret, &csr_pem)
            .await
            .map_err(|e| fatal(APP_IDENTITY, e))?;

        self.wallet
            .put(
                APP_IDENTITY,
                &LedgerIdentity {
                    msp_id: self.config.msp_id.clone(),
                    certificate,
                    private_key: key_pem,
                },
            )
            .await
            .map_err(|e| fatal(APP_IDENTITY, e))?;
        info!(identity = APP_IDENTITY, "credential enrolled and stored");
        Ok(())
    }
}

fn fatal(identity: &str, source: LedgerError) -> LedgerError {
    LedgerError::Provisioning {
        identity: identity.to_string(),
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubCa {
        enrolls: AtomicUsize,
        registers: AtomicUsize,
        fail_register: bool,
    }

    #[async_trait]
    impl CaApi for Arc<StubCa> {
        async fn enroll(
            &self,
            enrollment_id: &str,
            _secret: &str,
            _csr_pem: &str,
        ) -> LedgerResult<String> {
            self.enrolls.fetch_add(1, Ordering::SeqCst);
            Ok(format!(
                "-----BEGIN CERTIFICATE-----\n{enrollment_id}\n-----END CERTIFICATE-----\n"
            ))
        }

        async fn register(
            &self,
            _registrar_id: &str,
            _registrar_secret: &str,
            _enrollment_id: &str,
        ) -> LedgerResult<String> {
            if self.fail_register {
                return Err(LedgerError::Transport("CA unreachable".into()));
            }
            self.registers.fetch_add(1, Ordering::SeqCst);
            Ok("app-secret".into())
        }
    }

    fn config() -> LedgerConfig {
        let mut cfg = LedgerConfig::default();
        cfg.admin_secret = "adminpw".into();
        cfg
    }

    #[tokio::test]
    async fn provisions_both_identities_from_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Arc::new(FileWallet::new(dir.path()));
        let ca = Arc::new(StubCa::default());
        let provisioner = IdentityProvisioner::new(Arc::clone(&ca), Arc::clone(&wallet), config());

        provisioner.ensure_identities().await.unwrap();

        assert!(wallet.exists(ADMIN_IDENTITY).await);
        assert!(wallet.exists(APP_IDENTITY).await);
        // One register (app) and two enrolls (admin + app)
        assert_eq!(ca.registers.load(Ordering::SeqCst), 1);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 2);

        let app = wallet.get(APP_IDENTITY).await.unwrap().unwrap();
        assert!(app.certificate.contains("app-gateway"));
        assert!(app.private_key.contains("PRIVATE KEY"));
    }

    #[tokio::test]
    async fn present_identities_cause_no_ca_traffic() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Arc::new(FileWallet::new(dir.path()));
        for name in [ADMIN_IDENTITY, APP_IDENTITY] {
            wallet
                .put(
                    name,
                    &LedgerIdentity {
                        msp_id: "Org1MSP".into(),
                        certificate: "cert".into(),
                        private_key: "key".into(),
                    },
                )
                .await
                .unwrap();
        }

        let ca = Arc::new(StubCa::default());
        let provisioner = IdentityProvisioner::new(Arc::clone(&ca), wallet, config());
        provisioner.ensure_identities().await.unwrap();

        assert_eq!(ca.registers.load(Ordering::SeqCst), 0);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registration_failure_is_fatal_and_leaves_no_credential() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = Arc::new(FileWallet::new(dir.path()));
        let ca = Arc::new(StubCa {
            fail_register: true,
            ..Default::default()
        });
        let provisioner = IdentityProvisioner::new(ca, Arc::clone(&wallet), config());

        let err = provisioner.ensure_identities().await.unwrap_err();
        match err {
            LedgerError::Provisioning { identity, .. } => assert_eq!(identity, APP_IDENTITY),
            other => panic!("unexpected error {other:?}"),
        }
        // Admin succeeded before the app step failed
        assert!(wallet.exists(ADMIN_IDENTITY).await);
        assert!(!wallet.exists(APP_IDENTITY).await);
    }
}
