//! Operation execution
//!
//! The executor drives one opaque long-running task and turns its
//! milestones into status messages on the outbound stream.

pub mod executor;
pub mod sink;

pub use executor::{OperationExecutor, TerminalOutcome};
pub use sink::{ChannelSink, MessageSink, SinkError};
