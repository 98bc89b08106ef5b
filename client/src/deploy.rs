//! Connector deployment
//!
//! Before any remote call, the connector artifacts are copied into the
//! server's deploy folder so the operation endpoints exist on the other
//! side. The copy is idempotent: a target that is at least as new as its
//! source is left alone, so repeated runs against the same server do
//! nothing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::ClientError;

/// Environment variable naming the connector directory, relative to the
/// deploy folder.
pub const CONNECTOR_DIR_VAR: &str = "PKGSTREAM_CONNECTOR_DIR";

pub const DEFAULT_CONNECTOR_DIR: &str = "_pkgstream/connector";

struct FileToDeploy {
    source: &'static str,
    target: &'static str,
}

/// Artifacts placed into the deploy folder. `[connector_dir]` expands to
/// the configured connector directory.
const FILES_TO_DEPLOY: &[FileToDeploy] = &[
    FileToDeploy {
        source: "pkgstream-service",
        target: "bin",
    },
    FileToDeploy {
        source: "includes/connector.json",
        target: "[connector_dir]",
    },
    FileToDeploy {
        source: "includes/routes.json",
        target: "[connector_dir]",
    },
];

/// The connector directory, relative to the deploy folder.
pub fn connector_dir() -> String {
    std::env::var(CONNECTOR_DIR_VAR).unwrap_or_else(|_| DEFAULT_CONNECTOR_DIR.to_string())
}

/// Copy the connector artifacts into the deploy folder.
pub fn deploy_connector(artifacts_dir: &Path, deploy_folder: &Path) -> Result<(), ClientError> {
    debug!("Deploying connector from {}", artifacts_dir.display());

    let connector_dir = connector_dir();
    fs::create_dir_all(deploy_folder.join(&connector_dir))?;

    for file in FILES_TO_DEPLOY {
        let source = artifacts_dir.join(file.source);
        if !source.is_file() {
            return Err(ClientError::Deploy(format!(
                "Cannot find the source file {}",
                source.display()
            )));
        }

        let target_dir =
            deploy_folder.join(file.target.replace("[connector_dir]", &connector_dir));
        fs::create_dir_all(&target_dir)?;

        let file_name = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(file.source));
        let target = target_dir.join(file_name);

        if is_up_to_date(&source, &target) {
            debug!(
                "File {} already deployed and unchanged since the last install",
                target.display()
            );
            continue;
        }

        fs::copy(&source, &target).map_err(|e| {
            ClientError::Deploy(format!(
                "Error when deploying {} to {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        debug!("File {} deployed to {}", source.display(), target.display());
    }

    info!("Connector deployed successfully.");
    Ok(())
}

/// Remove the deployed connector directory.
pub fn remove_connector(deploy_folder: &Path) -> Result<(), ClientError> {
    let connector_path = deploy_folder.join(connector_dir());
    if connector_path.is_dir() {
        fs::remove_dir_all(&connector_path).map_err(|e| {
            ClientError::Deploy(format!(
                "Cannot remove the connector at {}: {}",
                connector_path.display(),
                e
            ))
        })?;
        info!("Connector removed.");
    }
    Ok(())
}

fn is_up_to_date(source: &Path, target: &Path) -> bool {
    let (Ok(source_meta), Ok(target_meta)) = (fs::metadata(source), fs::metadata(target)) else {
        return false;
    };
    match (source_meta.modified(), target_meta.modified()) {
        (Ok(source_time), Ok(target_time)) => target_time >= source_time,
        _ => false,
    }
}
