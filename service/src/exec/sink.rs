//! Outbound message sink
//!
//! The sink is the flush boundary: a message handed to it has left the
//! executor and is on its way down the socket before the executor may
//! proceed. The channel is bounded at one frame, so a slow reader stalls
//! the operation instead of growing a buffer.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use pkgstream_protocol::{encode_message, ProtocolError, StatusMessage};

/// Why an emission could not reach the transport.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The response body was dropped; the client is gone.
    #[error("stream consumer disconnected")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] ProtocolError),
}

/// Destination for emitted status messages.
#[async_trait]
pub trait MessageSink: Send {
    /// Serialize and flush one message. Must not return until the message
    /// is handed to the transport (no batching, no reordering).
    async fn send(&mut self, msg: &StatusMessage) -> Result<(), SinkError>;
}

/// Sink writing encoded frames into the response-body channel.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&mut self, msg: &StatusMessage) -> Result<(), SinkError> {
        let frame = encode_message(msg)?;
        self.tx
            .send(Bytes::from(frame))
            .await
            .map_err(|_| SinkError::Closed)
    }
}
