use clap::Parser;
use std::{env::current_dir, path::PathBuf, sync::Arc};
use tagtrack_common::{
    AssetStore, IdentityResolver, InMemoryAssetStore, Logger, StaticTokenResolver,
};
use tagtrack_core::{
    ingest::IngestContext, CommandDispatcher, DeviceRegistry, EventBus, IngestSupervisor,
    TelemetryStore,
};
use tagtrack_error::{TrackError, TrackResult};
use tagtrack_ledger::{
    ConnectionProfile, FileWallet, HttpCaClient, HttpConnector, IdentityProvisioner, LedgerGateway,
};
use tagtrack_models::{constants::DEFAULT_CONFIG_FILE_NAME, Settings};
use tagtrack_web::{AppState, TrackWebServer};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// TagTrack - NFC asset tracking service
///
/// Ingests tracker telemetry and reader scan events over MQTT, streams
/// live events to observers, and records asset actions on a permissioned
/// ledger network.
#[derive(Parser)]
#[command(name = "tagtrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "TagTrack", long_about = None)]
struct Cli {
    /// Sets a custom config file with full path
    ///
    /// If not specified, the service looks for 'tagtrack.toml' in the
    /// current working directory.
    #[arg(short, long, env = "TT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> TrackResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(p) => p,
        None => {
            let dir = current_dir()
                .map_err(|e| TrackError::from(format!("Failed to get current directory: {e}")))?;
            dir.join(DEFAULT_CONFIG_FILE_NAME)
        }
    };
    let settings = Settings::new(config_path.to_string_lossy().to_string())?;

    let mut logger = Logger::new(None);
    logger.initialize()?;

    // Ledger readiness gate: profile and identities must be in place
    // before anything ledger-dependent is served. Failure here exits the
    // process; credential problems need an operator, not a retry loop.
    let profile = ConnectionProfile::load(&settings.ledger.profile_path).await?;
    let wallet = Arc::new(FileWallet::new(settings.ledger.wallet_dir.clone()));
    let ca = HttpCaClient::from_profile(&profile, &settings.ledger.msp_id)?;
    IdentityProvisioner::new(ca, Arc::clone(&wallet), settings.ledger.clone())
        .ensure_identities()
        .await?;

    // Ingestion/streaming domain
    let registry = Arc::new(DeviceRegistry::new());
    let store = Arc::new(TelemetryStore::new());
    let bus = Arc::new(EventBus::new(settings.broker.bus_capacity));
    let assets: Arc<dyn AssetStore> = Arc::new(InMemoryAssetStore::new());

    let supervisor = IngestSupervisor::new(
        settings.clone(),
        IngestContext {
            registry: Arc::clone(&registry),
            store: Arc::clone(&store),
            bus: Arc::clone(&bus),
            assets: Arc::clone(&assets),
        },
    );
    let dispatcher = Arc::new(CommandDispatcher::new(
        supervisor.shared_client(),
        settings.broker.namespace.clone(),
    ));

    let cancel = CancellationToken::new();
    supervisor.run(cancel.clone());

    // Ledger domain
    let ledger = Arc::new(LedgerGateway::new(
        Arc::new(HttpConnector::default()),
        wallet,
        profile,
        settings.ledger.clone(),
    ));

    let resolver: Arc<dyn IdentityResolver> = Arc::new(StaticTokenResolver::new(&settings.web.auth));
    let state = Arc::new(AppState {
        registry,
        store,
        bus,
        dispatcher,
        ledger,
        assets,
        resolver,
        auth_enabled: settings.web.auth.enabled,
    });

    let server = TrackWebServer::start(&settings, state).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| TrackError::from(format!("Failed to listen for shutdown signal: {e}")))?;
    info!("shutdown signal received");

    cancel.cancel();
    server.stop().await?;
    Ok(())
}
