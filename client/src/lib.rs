//! pkgstream client library
//!
//! Validates the command line into one operation request, deploys the
//! connector artifacts next to the target, triggers the operation over
//! HTTP, and follows the status-message stream until the server closes
//! it. The process exit code is the machine-readable outcome.

pub mod cli;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod outcome;
pub mod request;
pub mod stream;
