use crate::cli::ServeOpts;
use crate::config::Config;
use crate::origin::routes;
use crate::origin::store::{ConfigStore, SqliteStore, TrackingSink};

use anyhow::{Context, Result};
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shared state for the origin handlers.
#[derive(Clone)]
pub struct OriginState {
    pub store: Arc<dyn ConfigStore>,
    pub sink: Arc<dyn TrackingSink>,
    /// `Cache-Control` value sent with the configuration.
    pub cache_control: String,
    pub start_time: std::time::Instant,
    pub version: String,
}

impl OriginState {
    pub fn new(store: Arc<dyn ConfigStore>, sink: Arc<dyn TrackingSink>, cache_control: String) -> Self {
        Self {
            store,
            sink,
            cache_control,
            start_time: std::time::Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The origin HTTP server.
pub struct OriginServer {
    state: OriginState,
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl OriginServer {
    /// Open the store and prepare the server with the given configuration.
    pub async fn start(config: Config, opts: ServeOpts) -> Result<Self> {
        let port = opts.port.unwrap_or(config.server.port);
        let bind = opts.bind.as_deref().unwrap_or(&config.server.bind);
        let addr = resolve_bind_address(bind, port)?;

        let db_path = config.db_path();
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
        if store.seed_default().await? {
            info!("Provisioned default widget configuration");
        }

        let store = Arc::new(store);
        let state = OriginState::new(
            store.clone(),
            store,
            config.cache_control.header_value(),
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        info!("Origin server binding to {}", addr);

        Ok(Self {
            state,
            addr,
            shutdown_tx,
        })
    }

    /// Run the server until a shutdown signal is received.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let app = build_router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        let local = listener.local_addr()?;

        print_startup_banner(&self.state, &local);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let external = async move {
            let _ = shutdown_rx.recv().await;
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = external => info!("Shutdown requested"),
                }
            })
            .await?;

        info!("Origin server shut down gracefully");
        Ok(())
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A handle that triggers graceful shutdown when sent to.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

/// Build the Axum router with all routes.
fn build_router(state: OriginState) -> Router {
    routes::build_routes(state)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Resolve the bind address from host and port.
fn resolve_bind_address(bind: &str, port: u16) -> Result<SocketAddr> {
    let host = match bind {
        "localhost" => IpAddr::from([127, 0, 0, 1]),
        other => other
            .parse()
            .with_context(|| format!("Invalid bind host '{other}'"))?,
    };
    Ok(SocketAddr::new(host, port))
}

/// Print startup banner with server info.
fn print_startup_banner(state: &OriginState, addr: &SocketAddr) {
    info!("-------------------------------------------");
    info!("  chatwidget origin v{}", state.version);
    info!("  Listening on: http://{}", addr);
    info!("  Config: http://{}/whatsapp/config", addr);
    info!("  Track: http://{}/whatsapp/track", addr);
    info!("  Health: http://{}/api/health", addr);
    info!("  Cache-Control: {}", state.cache_control);
    info!("-------------------------------------------");
}
