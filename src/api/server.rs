//! API server.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ApiConfig;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Start the API server and run until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = self.socket_addr()?;

        info!("🚀 Starting Wingo round engine API");
        info!("   Listen: http://{}", addr);
        self.log_endpoints();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("🛑 API server stopped gracefully");
        Ok(())
    }

    /// Create the application with the middleware stack.
    fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            // Request ID middleware (first for tracing)
            .layer(axum::middleware::from_fn(request_id_middleware))
            // CORS layer (before timeout to handle preflight)
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            // Timeout layer
            .layer(TimeoutLayer::new(std::time::Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            // Tracing layer (last for complete request tracing)
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    fn log_endpoints(&self) {
        info!("📊 Available endpoints:");
        info!("   GET  /health                        - Health check");
        info!("   GET  /clock/:track                  - Period id + time remaining");
        info!("   GET  /results/:track                - Outcome history");
        info!("   POST /bets                          - Place a wager");
        info!("   GET  /bets/:user_id                 - My bets");
        info!("   POST /settle/:track                 - Settlement trigger");
        info!("   GET  /account/:user_id              - Balance and turnover");
        info!("   POST /account/:user_id/deposit      - Turnover-linked credit");
        info!("   GET  /account/:user_id/withdrawable - Withdrawal gate");
        info!("   GET  /admin/override                - Operator override");
        info!("   POST /wheel/:user_id/spin           - Bonus wheel");
        info!("   GET  /ws                            - Subscription feed");
        info!("   GET  /metrics                       - Prometheus metrics");
    }
}

/// Wait for a shutdown signal.
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
