//! Streaming consumer
//!
//! Triggers the operation over HTTP and follows the response body while
//! the remote task runs. Messages are decoded incrementally and
//! dispatched to the log the moment each element completes; ERROR
//! messages are accumulated, FATAL is recorded, and in both cases the
//! rest of the stream is drained until the server closes it. A stream
//! that ends without the closing envelope tag is a transport failure,
//! not a finished operation.

use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, error, info, warn};
use url::Url;

use pkgstream_protocol::{Level, PackageInstallBody, StatusMessage, StreamDecoder};

use crate::errors::ClientError;
use crate::request::{check_merge_mode, ConnectorKind, OperationRequest};

const BODY_SNIPPET_MAX: usize = 2048;

/// Connection settings for one operation.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub base_url: String,
    /// Accept self-signed certificates.
    pub ssl: bool,
    /// Overall request timeout; `None` leaves the request unbounded.
    pub timeout_secs: Option<u64>,
}

/// What the stream reported, once it closed.
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub messages: usize,
    /// Text of every ERROR message, in arrival order.
    pub errors: Vec<String>,
    pub saw_fatal: bool,
}

impl StreamSummary {
    pub fn is_success(&self) -> bool {
        !self.saw_fatal && self.errors.is_empty()
    }
}

/// Trigger the operation and follow its stream to the end.
pub async fn run_operation(
    options: &StreamOptions,
    request: &OperationRequest,
) -> Result<StreamSummary, ClientError> {
    let client = build_client(options)?;
    let base = parse_base_url(&options.base_url)?;

    let pending = match request {
        OperationRequest::Install {
            kind: ConnectorKind::Tds,
            package_path,
            ..
        } => {
            let mut url = base.join("connector/installer")?;
            url.query_pairs_mut()
                .append_pair("package", package_path)
                .append_pair("install", "1")
                .append_pair("upgrade", "1")
                .append_pair("history", "");
            info!("Calling {}", url);
            client.get(url)
        }
        OperationRequest::Install {
            kind: ConnectorKind::Cms,
            package_path,
            merge_mode,
        } => {
            // Merge-mode syntax is checked here, just before the call
            let merge_mode = check_merge_mode(merge_mode.as_deref())?;
            let url = base.join("connector/package")?;
            info!("Calling {}", url);
            client.post(url).json(&PackageInstallBody {
                package_path: package_path.clone(),
                merge_mode,
            })
        }
        OperationRequest::Publish(body) => {
            let url = base.join("connector/publish")?;
            info!("Calling {}", url);
            client.post(url).json(body)
        }
    };

    let response = pending.send().await.map_err(ClientError::from_request_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Transport {
            reason: format!("server answered {}", status),
            code: Some(status.as_u16()),
            body_snippet: Some(snippet(&body)),
        });
    }

    follow_stream(response).await
}

async fn follow_stream(response: reqwest::Response) -> Result<StreamSummary, ClientError> {
    let mut decoder = StreamDecoder::new();
    let mut summary = StreamSummary::default();
    let mut byte_stream = response.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(ClientError::from_request_error)?;
        decoder.push(&chunk);

        loop {
            match decoder.next_message() {
                Ok(Some(msg)) => dispatch(&msg, &mut summary),
                Ok(None) => break,
                // A bad element is dropped; the stream stays usable
                Err(e) => warn!("Skipping malformed status message: {}", e),
            }
        }
    }

    if !decoder.saw_close() {
        return Err(ClientError::Transport {
            reason: "the stream ended before the closing envelope tag".to_string(),
            code: None,
            body_snippet: None,
        });
    }

    Ok(summary)
}

fn dispatch(msg: &StatusMessage, summary: &mut StreamSummary) {
    summary.messages += 1;
    match msg.level {
        Level::Fatal => {
            summary.saw_fatal = true;
            error!("{}", msg);
        }
        Level::Error => {
            summary.errors.push(msg.message.clone());
            error!("{}", msg);
        }
        Level::Warn => warn!("{}", msg),
        Level::Debug => debug!("{}", msg),
        Level::Info => info!("{}", msg),
    }
}

fn build_client(options: &StreamOptions) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = options.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if options.ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(ClientError::from_request_error)
}

/// Parse the base URL, ensuring a trailing slash so joins stay under it.
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_MAX {
        body.to_string()
    } else {
        let mut end = BODY_SNIPPET_MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}
