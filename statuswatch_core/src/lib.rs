//! Core library for the endpoint health monitor: target model, probing,
//! result storage and persistence, authorization and the HTTP API.

pub mod auth;
pub mod background;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod monitor;
pub mod probe;
pub mod store;

pub use auth::{Authorizer, Denial};
pub use background::BackgroundTasks;
pub use cache::CachePersister;
pub use config::{AppConfig, ConfigHandle, Configuration, LoadedConfiguration};
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;
pub use models::{EndpointResult, ResultStatus};
pub use monitor::{Monitor, ProbeOutcome, Scheduler, SweepSummary};
pub use probe::{Clock, HttpTransport, ReqwestTransport, SystemClock};
pub use store::ResultStore;

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub monitor: Arc<Monitor>,
    pub started: Instant,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            app_name: "statuswatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            monitor,
            started: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(create_routes(state.clone()))
        .layer(middleware::logging::logging_layer())
        .with_state(state)
}

pub async fn run_server<F>(app: Router, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
