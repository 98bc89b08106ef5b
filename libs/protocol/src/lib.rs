//! pkgstream protocol library
//!
//! Shared between the service and the client: the status-message model,
//! per-operation progress math, and the XML wire framing used on the
//! long-lived response stream.

pub mod message;
pub mod ops;
pub mod progress;
pub mod wire;

pub use message::{ExceptionDetail, Level, Progress, StatusMessage};
pub use ops::{MergeMode, PackageInstallBody, PublishBody, PublishMode};
pub use progress::ProgressTracker;
pub use wire::{encode_message, StreamDecoder, STREAM_CLOSE, STREAM_PREAMBLE};

use thiserror::Error;

/// Errors raised while encoding or decoding the message stream
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid UTF-8 in stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed status message: {0}")]
    Malformed(String),
}
