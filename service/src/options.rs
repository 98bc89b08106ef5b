//! Service configuration options

use std::path::PathBuf;

use clap::Parser;

/// Connector service for streaming package installation
#[derive(Debug, Clone, Parser)]
#[command(name = "pkgstream-service", version)]
pub struct ServiceOptions {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8090)]
    pub port: u16,

    /// Root of the content repository that packages are applied to
    #[arg(long, default_value = "/var/lib/pkgstream/repository")]
    pub repo_root: PathBuf,

    /// Directory bare package names are resolved against
    #[arg(long, default_value = "/var/lib/pkgstream/packages")]
    pub packages_root: PathBuf,

    /// Default directory for installation history artifacts
    #[arg(long, default_value = "/var/lib/pkgstream/history")]
    pub history_root: PathBuf,

    /// Directory holding the publishable databases (one subdirectory each)
    #[arg(long, default_value = "/var/lib/pkgstream/databases")]
    pub dbs_root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
            repo_root: PathBuf::from("/var/lib/pkgstream/repository"),
            packages_root: PathBuf::from("/var/lib/pkgstream/packages"),
            history_root: PathBuf::from("/var/lib/pkgstream/history"),
            dbs_root: PathBuf::from("/var/lib/pkgstream/databases"),
            log_level: "info".to_string(),
        }
    }
}
