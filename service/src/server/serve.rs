//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::ServiceError;
use crate::options::ServiceOptions;
use crate::server::handlers::{
    health_handler, installer_handler, package_handler, publish_handler,
};
use crate::server::state::ServiceState;

/// Start the HTTP server
pub async fn serve(
    options: &ServiceOptions,
    state: Arc<ServiceState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ServiceError>>, ServiceError> {
    let app = Router::new()
        // Health
        .route("/health", get(health_handler))
        // Operation triggers, all answered with a streamed body
        .route("/connector/installer", get(installer_handler))
        .route("/connector/package", post(package_handler))
        .route("/connector/publish", post(publish_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting pkgstream service on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServiceError::ServerError(e.to_string()))
    });

    Ok(handle)
}
