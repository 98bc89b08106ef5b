//! Command line surface

use std::path::PathBuf;

use clap::Parser;

/// Installs a content package on a remote server, or publishes items
/// between its databases, following the progress stream until the
/// operation ends.
#[derive(Parser, Debug, Clone)]
#[command(name = "pkgstream", version, about)]
pub struct CliOptions {
    /// Path to the package. Must be reachable by the server.
    #[arg(short = 'p', long = "package-path")]
    pub package_path: Option<String>,

    /// URL of the root of the target server.
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Path to the server's deploy folder, where connector artifacts land.
    #[arg(short = 'f', long = "deploy-folder")]
    pub deploy_folder: Option<PathBuf>,

    /// Installation connector: "tds" or "cms".
    #[arg(short = 'c', long = "connector")]
    pub connector: Option<String>,

    /// Publish items instead of installing a package.
    #[arg(long = "publish")]
    pub publish: bool,

    /// Publish the children of the root item as well. Without this flag,
    /// --publish-root-item is required.
    #[arg(long = "publish-children")]
    pub publish_children: bool,

    /// Source database to publish from.
    #[arg(long = "publish-source-db", default_value = "master")]
    pub publish_source_db: String,

    /// Target database to publish to.
    #[arg(long = "publish-target-db", default_value = "web")]
    pub publish_target_db: String,

    /// Language to publish (all if omitted).
    #[arg(long = "publish-language")]
    pub publish_language: Option<String>,

    /// Root item to publish.
    #[arg(long = "publish-root-item")]
    pub publish_root_item: Option<String>,

    /// Publish mode: Full, Incremental, SingleItem or Smart.
    #[arg(long = "publish-mode")]
    pub publish_mode: Option<String>,

    /// Publish targets, comma separated when there are several.
    #[arg(long = "publish-targets")]
    pub publish_targets: Option<String>,

    /// Remove the deployed connector after the run.
    #[arg(long = "remove-connector")]
    pub remove_connector: bool,

    /// Accept self-signed TLS certificates.
    #[arg(long = "ssl")]
    pub ssl: bool,

    /// Merge mode for the install: merge, clear, append, skip or
    /// overwrite. Service default is overwrite.
    #[arg(long = "merge-mode")]
    pub merge_mode: Option<String>,

    /// Overall request timeout in seconds. Unbounded when omitted; an
    /// install is allowed to run arbitrarily long.
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Directory holding the connector artifacts to deploy. Defaults to
    /// the directory of the executable.
    #[arg(long = "artifacts-dir")]
    pub artifacts_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is not set.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_invocation() {
        let cli = CliOptions::try_parse_from([
            "pkgstream",
            "-u",
            "http://server/",
            "-f",
            "/srv/site",
            "-c",
            "cms",
            "-p",
            "/packages/demo",
            "--merge-mode",
            "skip",
        ])
        .unwrap();

        assert_eq!(cli.connector.as_deref(), Some("cms"));
        assert_eq!(cli.merge_mode.as_deref(), Some("skip"));
        assert!(!cli.publish);
        assert!(cli.timeout_secs.is_none());
    }

    #[test]
    fn test_parse_publish_invocation() {
        let cli = CliOptions::try_parse_from([
            "pkgstream",
            "-u",
            "http://server/",
            "-f",
            "/srv/site",
            "--publish",
            "--publish-mode",
            "smart",
            "--publish-children",
        ])
        .unwrap();

        assert!(cli.publish);
        assert!(cli.publish_children);
        assert_eq!(cli.publish_source_db, "master");
        assert_eq!(cli.publish_target_db, "web");
    }

    #[test]
    fn test_unknown_flag_is_a_parse_error() {
        assert!(CliOptions::try_parse_from(["pkgstream", "--frobnicate"]).is_err());
    }
}
