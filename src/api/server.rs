//! API Server
//!
//! Server setup: middleware stack, graceful shutdown, startup logging.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ServerConfig;
use crate::game_store::GameStore;
use crate::games::MinesEngine;
use crate::ledger::Ledger;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub struct ApiServer {
    config: ServerConfig,
    engine: Arc<MinesEngine>,
    ledger: Arc<Ledger>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, engine: Arc<MinesEngine>, ledger: Arc<Ledger>) -> Self {
        Self {
            config,
            engine,
            ledger,
        }
    }

    /// Start the API server and block until shutdown.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "minegrid=info,tower_http=info".into()),
            )
            .init();

        let app = self.create_app();
        let addr = self.socket_addr()?;

        info!("Starting Minegrid API server");
        info!("   Listen: http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn create_app(&self) -> axum::Router {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            ledger: self.ledger.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        });

        create_router(state)
            // Request ID middleware first so every log line can carry it
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS before timeout to handle preflight
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    fn log_server_info(&self) {
        let game = self.engine.config();
        info!("Server configuration:");
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        info!(
            "   Game: grid={} edge={}bps bets=[{}, {}] micros",
            game.grid_size, game.house_edge_bps, game.min_bet_micros, game.max_bet_micros
        );
        info!("Available endpoints:");
        info!("   GET  /health                       - Health check");
        info!("   POST /api/mines/bet                - Place bet");
        info!("   POST /api/mines/:game_id/reveal    - Reveal tile");
        info!("   POST /api/mines/:game_id/cashout   - Cash out");
        info!("   GET  /api/mines/:game_id           - Fetch session");
        info!("   POST /api/mines/verify             - Verify fairness");
        info!("   GET  /api/wallet/:user_id/balance  - Wallet balance");
        info!("   POST /api/wallet/:user_id/credit   - Fund wallet");
    }
}

/// Convenience wiring used by the binary: open storage once and share it
/// between the ledger and the session store so their writes can land in
/// one batch.
pub fn build_engine(
    storage: crate::storage::Storage,
    game_config: crate::config::GameConfig,
) -> (Arc<MinesEngine>, Arc<Ledger>, Arc<GameStore>) {
    let ledger = Arc::new(Ledger::new(storage.clone()));
    let store = Arc::new(GameStore::new(storage));
    let engine = Arc::new(MinesEngine::new(store.clone(), ledger.clone(), game_config));
    (engine, ledger, store)
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
