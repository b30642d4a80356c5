//! Application startup and lifecycle management.

use crate::config::ReconciliationConfig;
use crate::handlers::{
    health_check, liveness, metrics_handler, readiness_check, upload_statements,
};
use crate::services::{init_metrics, record_http_request, ReconciliationEngine};
use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ReconciliationConfig>,
    pub engine: Arc<ReconciliationEngine>,
}

impl AppState {
    pub fn new(config: ReconciliationConfig) -> Self {
        let engine = ReconciliationEngine::new(config.report.missing_user_id.clone());
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}

/// Count requests by matched route and response status.
async fn track_http_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    record_http_request(&route, response.status().as_u16());
    response
}

/// Build the HTTP router for the given state.
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.upload.max_upload_bytes;
    let request_timeout = state.config.upload.request_timeout;

    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/upload",
            post(upload_statements).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_http_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ReconciliationConfig) -> Result<Self, AppError> {
        init_metrics();

        tokio::fs::create_dir_all(&config.upload.scratch_dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    scratch_dir = %config.upload.scratch_dir.display(),
                    "Failed to prepare scratch directory"
                );
                AppError::from(e)
            })?;

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(http_port = port, "Reconciliation service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "reconciliation-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
