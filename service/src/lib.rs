//! pkgstream service library
//!
//! Hosts the connector endpoints: each request runs one long-lived
//! operation (package install or publish) and streams status messages
//! back over the open connection until the operation ends.

pub mod errors;
pub mod exec;
pub mod logs;
pub mod options;
pub mod server;
pub mod task;
