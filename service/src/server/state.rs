//! Shared server state

use std::path::PathBuf;

use crate::options::ServiceOptions;

/// Paths every operation resolves against.
///
/// Immutable after startup; each request builds its own task and executor
/// on top, so operations share nothing mutable.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub repo_root: PathBuf,
    pub packages_root: PathBuf,
    pub history_root: PathBuf,
    pub dbs_root: PathBuf,
}

impl ServiceState {
    pub fn from_options(options: &ServiceOptions) -> Self {
        Self {
            repo_root: options.repo_root.clone(),
            packages_root: options.packages_root.clone(),
            history_root: options.history_root.clone(),
            dbs_root: options.dbs_root.clone(),
        }
    }
}
