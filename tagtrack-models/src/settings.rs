use config::{Config, File};
use serde::Deserialize;
use std::{ops::Deref, sync::Arc};
use tagtrack_error::TrackResult;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Settings(Arc<Inner>);

impl Deref for Settings {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Settings {
    pub fn new(config_path: String) -> TrackResult<Self> {
        let builder = Config::builder()
            .add_source(File::with_name(config_path.as_str()).required(false))
            .add_source(
                config::Environment::with_prefix("TT")
                    .separator("__")
                    .try_parsing(true),
            );
        let inner: Inner = builder.build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }

    /// Settings built entirely from defaults (used by tests).
    pub fn from_defaults() -> TrackResult<Self> {
        let inner: Inner = Config::builder().build()?.try_deserialize()?;
        Ok(Self(Arc::new(inner)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Inner {
    #[serde(default)]
    pub broker: Broker,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub web: Web,
}

/// MQTT broker connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Broker {
    #[serde(default = "Broker::host_default")]
    pub host: String,
    #[serde(default = "Broker::port_default")]
    pub port: u16,
    /// Client id; a random suffix is appended so replicas never collide.
    #[serde(default = "Broker::client_id_default")]
    pub client_id: String,
    /// Topic namespace: inbound `<namespace>/<entity>/<kind>`, outbound
    /// `<namespace>/<device>/command`.
    #[serde(default = "Broker::namespace_default")]
    pub namespace: String,
    #[serde(default = "Broker::keep_alive_secs_default")]
    pub keep_alive_secs: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Reconnect backoff. Attempt/elapsed caps are ignored for the
    /// supervisor: broker reconnection retries indefinitely.
    #[serde(default = "Broker::reconnect_default")]
    pub reconnect: RetryPolicy,
    /// Capacity of the rumqttc request channel.
    #[serde(default = "Broker::channel_capacity_default")]
    pub channel_capacity: usize,
    /// Capacity of each event-bus broadcast channel.
    #[serde(default = "Broker::bus_capacity_default")]
    pub bus_capacity: usize,
}

impl Default for Broker {
    fn default() -> Self {
        Broker {
            host: Broker::host_default(),
            port: Broker::port_default(),
            client_id: Broker::client_id_default(),
            namespace: Broker::namespace_default(),
            keep_alive_secs: Broker::keep_alive_secs_default(),
            username: None,
            password: None,
            reconnect: Broker::reconnect_default(),
            channel_capacity: Broker::channel_capacity_default(),
            bus_capacity: Broker::bus_capacity_default(),
        }
    }
}

impl Broker {
    fn host_default() -> String {
        "localhost".into()
    }

    fn port_default() -> u16 {
        1883
    }

    fn client_id_default() -> String {
        "tagtrack".into()
    }

    fn namespace_default() -> String {
        "tagtrack".into()
    }

    fn keep_alive_secs_default() -> u64 {
        30
    }

    fn reconnect_default() -> RetryPolicy {
        RetryPolicy::unlimited()
    }

    fn channel_capacity_default() -> usize {
        100
    }

    fn bus_capacity_default() -> usize {
        1024
    }
}

/// Ledger network configuration. The endpoints themselves come from the
/// connection profile document; this section names what to resolve in it.
#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
    /// Path to the connection profile JSON document.
    #[serde(default = "Ledger::profile_path_default")]
    pub profile_path: String,
    /// Directory-backed credential wallet.
    #[serde(default = "Ledger::wallet_dir_default")]
    pub wallet_dir: String,
    #[serde(default = "Ledger::channel_default")]
    pub channel: String,
    #[serde(default = "Ledger::contract_default")]
    pub contract: String,
    /// Membership service provider id the identities belong to.
    #[serde(default = "Ledger::msp_id_default")]
    pub msp_id: String,
    /// Enrollment id of the administrative identity at the CA.
    #[serde(default = "Ledger::admin_id_default")]
    pub admin_id: String,
    /// Pre-shared bootstrap secret for administrative enrollment.
    #[serde(default)]
    pub admin_secret: String,
    /// Per-call timeout for submit/evaluate, distinct from broker backoff.
    #[serde(default = "Ledger::call_timeout_ms_default")]
    pub call_timeout_ms: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger {
            profile_path: Ledger::profile_path_default(),
            wallet_dir: Ledger::wallet_dir_default(),
            channel: Ledger::channel_default(),
            contract: Ledger::contract_default(),
            msp_id: Ledger::msp_id_default(),
            admin_id: Ledger::admin_id_default(),
            admin_secret: String::new(),
            call_timeout_ms: Ledger::call_timeout_ms_default(),
        }
    }
}

impl Ledger {
    fn profile_path_default() -> String {
        "./connection-profile.json".into()
    }

    fn wallet_dir_default() -> String {
        "./wallet".into()
    }

    fn channel_default() -> String {
        "trackchannel".into()
    }

    fn contract_default() -> String {
        "assetcontract".into()
    }

    fn msp_id_default() -> String {
        "Org1MSP".into()
    }

    fn admin_id_default() -> String {
        "admin".into()
    }

    fn call_timeout_ms_default() -> u64 {
        15_000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Web {
    #[serde(default = "Web::host_default")]
    pub host: String,
    #[serde(default = "Web::port_default")]
    pub port: u16,
    #[serde(default = "Web::router_prefix_default")]
    pub router_prefix: String,
    #[serde(default = "Web::workers_default")]
    pub workers: usize,
    #[serde(default)]
    pub auth: Auth,
}

impl Default for Web {
    fn default() -> Self {
        Web {
            host: Web::host_default(),
            port: Web::port_default(),
            router_prefix: Web::router_prefix_default(),
            workers: Web::workers_default(),
            auth: Default::default(),
        }
    }
}

impl Web {
    fn host_default() -> String {
        "0.0.0.0".into()
    }

    fn port_default() -> u16 {
        4850
    }

    fn router_prefix_default() -> String {
        "/api".into()
    }

    fn workers_default() -> usize {
        0 // 0 = number of CPUs (actix default)
    }
}

/// Bearer-token authentication for the HTTP/WS surface.
///
/// Token issuance is out of scope; the resolver seam maps opaque tokens
/// to caller identities. The static list here backs the default resolver.
#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    #[serde(default = "Auth::enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub tokens: Vec<StaticToken>,
}

impl Default for Auth {
    fn default() -> Self {
        Auth {
            enabled: Auth::enabled_default(),
            tokens: Vec::new(),
        }
    }
}

impl Auth {
    fn enabled_default() -> bool {
        false
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub subject: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_without_any_source() {
        let settings = Settings::from_defaults().unwrap();
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.broker.namespace, "tagtrack");
        assert_eq!(settings.ledger.channel, "trackchannel");
        assert_eq!(settings.ledger.call_timeout_ms, 15_000);
        assert!(!settings.web.auth.enabled);
        // Broker reconnection must be unbounded
        assert_eq!(settings.broker.reconnect.max_attempts, None);
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("TT__BROKER__HOST", "broker.internal");
        std::env::set_var("TT__LEDGER__MSP_ID", "AssetOrgMSP");
        let settings = Settings::new("does-not-exist".into()).unwrap();
        assert_eq!(settings.broker.host, "broker.internal");
        assert_eq!(settings.ledger.msp_id, "AssetOrgMSP");
        std::env::remove_var("TT__BROKER__HOST");
        std::env::remove_var("TT__LEDGER__MSP_ID");
    }
}
