//! HTTP request handlers
//!
//! Every operation endpoint answers with a streamed body: the handler
//! spawns the executor, hands it the sending half of a bounded channel,
//! and returns a body fed from the receiving half. The response stream
//! lives exactly as long as the operation; the closing envelope tag is
//! written only when the run ends normally.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use pkgstream_protocol::{
    MergeMode, PackageInstallBody, PublishBody, STREAM_CLOSE, STREAM_PREAMBLE,
};

use crate::exec::{ChannelSink, OperationExecutor, SinkError, TerminalOutcome};
use crate::server::state::ServiceState;
use crate::task::package::InstallAction;
use crate::task::{OperationTask, PublishTask, UpdatePackageTask};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "pkgstream-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Query parameters of the GET-style install trigger
#[derive(Debug, Deserialize)]
pub struct InstallerQuery {
    /// Package path, or bare name resolved under the packages root
    pub package: Option<String>,

    /// "1" installs fresh (overwrite), anything else updates (merge)
    pub install: Option<String>,

    /// "1" applies changes, anything else previews
    pub upgrade: Option<String>,

    /// Optional override for the history root
    pub history: Option<String>,
}

/// GET install trigger: update-package installation, streamed.
pub async fn installer_handler(
    State(state): State<Arc<ServiceState>>,
    Query(query): Query<InstallerQuery>,
) -> Response {
    let raw_package = query.package.unwrap_or_default();
    let package_path = if raw_package.is_empty() {
        // Missing parameter surfaces as the FATAL "not found" message on
        // the stream, not as an HTTP error
        PathBuf::new()
    } else {
        UpdatePackageTask::resolve_package_path(&state.packages_root, &raw_package)
    };

    let merge_mode = if query.install.as_deref() == Some("1") {
        MergeMode::Overwrite
    } else {
        MergeMode::Merge
    };
    let action = if query.upgrade.as_deref() == Some("1") {
        InstallAction::Upgrade
    } else {
        InstallAction::Preview
    };
    let history_root = match query.history.as_deref() {
        Some(history) if !history.is_empty() => PathBuf::from(history),
        _ => state.history_root.clone(),
    };

    info!("Install requested for package: {}", package_path.display());

    let task = UpdatePackageTask::new(
        package_path,
        state.repo_root.clone(),
        history_root,
        merge_mode,
        action,
    );
    stream_operation(task)
}

/// Structured install call: package path plus optional merge mode.
pub async fn package_handler(
    State(state): State<Arc<ServiceState>>,
    Json(body): Json<PackageInstallBody>,
) -> Response {
    let package_path =
        UpdatePackageTask::resolve_package_path(&state.packages_root, &body.package_path);
    let merge_mode = body.merge_mode.unwrap_or(MergeMode::Overwrite);

    info!(
        "Install requested for package: {} (merge mode: {})",
        package_path.display(),
        merge_mode.as_str()
    );

    let task = UpdatePackageTask::new(
        package_path,
        state.repo_root.clone(),
        state.history_root.clone(),
        merge_mode,
        InstallAction::Upgrade,
    );
    stream_operation(task)
}

/// Publish call.
pub async fn publish_handler(
    State(state): State<Arc<ServiceState>>,
    Json(body): Json<PublishBody>,
) -> Response {
    info!(
        "Publish requested: {} -> {} ({})",
        body.source_db,
        body.target_db,
        body.mode.as_str()
    );

    let task = PublishTask::from_body(&state.dbs_root, &body);
    stream_operation(task)
}

/// Run one operation and stream its messages as the response body.
///
/// The channel is bounded at one frame: the executor blocks on a slow
/// reader instead of buffering, and a dropped body (client disconnect)
/// fails the next send, aborting the run.
fn stream_operation<T>(task: T) -> Response
where
    T: OperationTask + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(1);

    tokio::spawn(async move {
        if tx
            .send(Bytes::from_static(STREAM_PREAMBLE.as_bytes()))
            .await
            .is_err()
        {
            warn!("Client disconnected before the stream opened");
            return;
        }

        let sink = ChannelSink::new(tx.clone());
        let mut executor = OperationExecutor::new(sink);

        match executor.run(&task).await {
            Ok(TerminalOutcome::Completed { history }) => match history {
                Some(history) => info!("Operation completed, history: {}", history),
                None => info!("Operation completed"),
            },
            Ok(TerminalOutcome::Failed { errors }) => {
                warn!("Operation finished with {} errors", errors.len());
            }
            Err(SinkError::Closed) => {
                warn!("Client disconnected mid-operation, aborting");
                return;
            }
            Err(SinkError::Encode(e)) => {
                error!("Failed to encode status message: {}", e);
                return;
            }
        }

        let _ = tx.send(Bytes::from_static(STREAM_CLOSE.as_bytes())).await;
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap()
}
