//! Exit outcome mapping
//!
//! Every run ends in exactly one terminal outcome, and each outcome maps
//! to one fixed process exit code. Automation pipelines branch on these
//! codes, so the mapping is total and stable.

use crate::errors::ClientError;
use crate::stream::StreamSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Operation finished with no ERROR or FATAL messages.
    Completed,
    /// Option parsing or up-front validation failed; no connection was
    /// attempted.
    ValidationFailed,
    /// Connector artifacts could not be placed; no remote call was made.
    ConnectorDeployFailed,
    /// A local failure outside the other categories.
    UnexpectedLocalError,
    /// Catch-all for anything uncaught at the outermost boundary.
    UnhandledFailure,
    /// The remote operation ran but reported ERROR or FATAL messages.
    RemoteFailed,
    /// Connection, TLS, non-success HTTP status, or a stream cut off
    /// before the closing envelope.
    TransportError,
    /// Merge-mode value failed its lazy syntax check.
    InvalidMergeMode,
}

impl ExitOutcome {
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Completed => 0,
            ExitOutcome::ValidationFailed => 100,
            ExitOutcome::ConnectorDeployFailed => 101,
            ExitOutcome::UnexpectedLocalError => 102,
            ExitOutcome::UnhandledFailure => 103,
            ExitOutcome::RemoteFailed => 104,
            ExitOutcome::TransportError => 105,
            ExitOutcome::InvalidMergeMode => 106,
        }
    }

    pub fn from_client_error(e: &ClientError) -> Self {
        match e {
            ClientError::Transport { .. } => ExitOutcome::TransportError,
            ClientError::InvalidMergeMode(_) => ExitOutcome::InvalidMergeMode,
            ClientError::Deploy(_) => ExitOutcome::ConnectorDeployFailed,
            ClientError::Io(_) | ClientError::Url(_) => ExitOutcome::UnexpectedLocalError,
        }
    }

    pub fn from_summary(summary: &StreamSummary) -> Self {
        if summary.is_success() {
            ExitOutcome::Completed
        } else {
            ExitOutcome::RemoteFailed
        }
    }
}
