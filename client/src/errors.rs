//! Client error types

use thiserror::Error;

/// Errors surfaced by the client before, during, or after the stream.
///
/// Transport failures keep the remote status code and a body snippet so
/// the diagnostics the server sent are not lost; they are never merged
/// with the application-level FATAL/ERROR messages arriving on a healthy
/// stream.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("connector deployment failed: {0}")]
    Deploy(String),

    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        code: Option<u16>,
        body_snippet: Option<String>,
    },

    #[error("{0}")]
    InvalidMergeMode(String),
}

impl ClientError {
    /// Connection-level reqwest failures become transport errors with no
    /// status code.
    pub fn from_request_error(e: reqwest::Error) -> Self {
        ClientError::Transport {
            reason: e.to_string(),
            code: e.status().map(|s| s.as_u16()),
            body_snippet: None,
        }
    }
}
