//! Web surface: device/asset REST API plus the observer event stream.
mod api;
mod middleware;

use actix_web::{
    dev::ServerHandle,
    middleware::{Compress, NormalizePath},
    web::{self, Data},
    App, HttpServer,
};
use std::sync::Arc;
use tagtrack_common::{AssetStore, IdentityResolver};
use tagtrack_core::{CommandDispatcher, DeviceRegistry, EventBus, TelemetryStore};
use tagtrack_error::{TrackError, TrackResult};
use tagtrack_ledger::LedgerGateway;
use tagtrack_models::Settings;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Shared application state handed to every handler.
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub store: Arc<TelemetryStore>,
    pub bus: Arc<EventBus>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub ledger: Arc<LedgerGateway>,
    pub assets: Arc<dyn AssetStore>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub auth_enabled: bool,
}

/// HTTP server lifecycle wrapper.
pub struct TrackWebServer {
    server: Arc<Mutex<Option<ServerHandle>>>,
}

impl TrackWebServer {
    /// Start serving in a background task.
    pub async fn start(settings: &Settings, state: Arc<AppState>) -> TrackResult<Self> {
        let addr = format!("{}:{}", settings.web.host, settings.web.port);
        let router_prefix = settings.web.router_prefix.clone();
        let workers = settings.web.workers;

        let data = Data::new(state);
        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .wrap(middleware::auth::Authentication)
                .wrap(middleware::cors())
                .wrap(actix_web::middleware::Logger::default())
                .wrap(Compress::default())
                .wrap(NormalizePath::trim())
                .service(web::scope(&router_prefix).configure(api::configure_routes))
        });
        if workers > 0 {
            server = server.workers(workers);
        }

        let server = server
            .bind(&addr)
            .map_err(|e| TrackError::from(format!("Failed to bind HTTP server to {addr}: {e}")))?
            .run();
        let handle = server.handle();

        tokio::spawn(async move {
            if let Err(e) = server.await {
                error!(error = %e, "web server failed");
            }
        });
        info!(addr = %addr, "web server listening");

        Ok(Self {
            server: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Gracefully stop the web server.
    pub async fn stop(&self) -> TrackResult<()> {
        info!("stopping web server");
        let mut guard = self.server.lock().await;
        if let Some(handle) = guard.take() {
            handle.stop(true).await;
        }
        Ok(())
    }
}
