//! Request validation and assembly
//!
//! Turns the raw command line into exactly one operation request, or a
//! list of human-readable errors. Every rule is evaluated independently
//! and all violations are collected before reporting; nothing is
//! partially applied. The merge-mode value is the one deliberate
//! exception: its syntax is checked lazily, just before the install call
//! is made, and has its own terminal outcome.

use std::str::FromStr;

use pkgstream_protocol::{MergeMode, PublishBody, PublishMode};

use crate::cli::CliOptions;
use crate::errors::ClientError;

/// Which connector drives the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// Update-package connector, triggered via the GET-style call.
    Tds,
    /// Native package connector, triggered via the structured call and
    /// honoring the merge mode.
    Cms,
}

impl FromStr for ConnectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tds" => Ok(ConnectorKind::Tds),
            "cms" => Ok(ConnectorKind::Cms),
            _ => Err(format!(
                "The parameter --connector must be 'tds' or 'cms'. Current value is '{}'.",
                s
            )),
        }
    }
}

/// The single operation this invocation performs.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Install {
        kind: ConnectorKind,
        package_path: String,
        /// Raw merge-mode string, validated lazily by
        /// [`check_merge_mode`] before the install call.
        merge_mode: Option<String>,
    },
    Publish(PublishBody),
}

/// Validate the command line and assemble the operation request.
///
/// Returns every violation found, not just the first one.
pub fn validate(cli: &CliOptions) -> Result<OperationRequest, Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    if cli.url.as_deref().unwrap_or("").is_empty() {
        errors.push("The server URL is required.".to_string());
    }

    if cli.deploy_folder.is_none() {
        errors.push("The deploy folder is required.".to_string());
    }

    let connector = match cli.connector.as_deref() {
        Some(raw) => match raw.parse::<ConnectorKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        None => {
            if !cli.publish {
                errors.push(
                    "The parameter --connector is required if you are not in publish mode."
                        .to_string(),
                );
            }
            None
        }
    };

    if !cli.publish
        && cli.connector.is_some()
        && cli.package_path.as_deref().unwrap_or("").is_empty()
    {
        errors.push(
            "The parameter --package-path is required if you use the --connector parameter."
                .to_string(),
        );
    }

    let publish_mode = if cli.publish {
        match cli.publish_mode.as_deref() {
            Some(raw) => match raw.parse::<PublishMode>() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => {
                errors.push(
                    "The parameter --publish-mode is required if you use the --publish flag."
                        .to_string(),
                );
                None
            }
        }
    } else {
        None
    };

    if cli.publish && !cli.publish_children && cli.publish_root_item.is_none() {
        errors.push(
            "The parameter --publish-root-item is required unless --publish-children is set."
                .to_string(),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    if cli.publish {
        let targets = cli.publish_targets.as_deref().map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        });

        // publish_mode is Some here: its absence was a collected error
        Ok(OperationRequest::Publish(PublishBody {
            mode: publish_mode.unwrap_or(PublishMode::Full),
            language: cli.publish_language.clone(),
            targets,
            recursive: cli.publish_children,
            source_db: cli.publish_source_db.clone(),
            target_db: cli.publish_target_db.clone(),
            root_item: cli.publish_root_item.clone(),
        }))
    } else {
        Ok(OperationRequest::Install {
            // connector is Some here for the same reason
            kind: connector.unwrap_or(ConnectorKind::Cms),
            package_path: cli.package_path.clone().unwrap_or_default(),
            merge_mode: cli.merge_mode.clone(),
        })
    }
}

/// Lazy merge-mode check, applied just before the install call.
///
/// An invalid value is immediately terminal with its own outcome; it is
/// never collected with the up-front validation errors.
pub fn check_merge_mode(raw: Option<&str>) -> Result<Option<MergeMode>, ClientError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<MergeMode>()
            .map(Some)
            .map_err(ClientError::InvalidMergeMode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> CliOptions {
        let mut argv = vec!["pkgstream"];
        argv.extend_from_slice(args);
        CliOptions::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_valid_install_request() {
        let cli = parse(&[
            "-u", "http://server/", "-f", "/srv/site", "-c", "tds", "-p", "/pkg/demo",
        ]);

        let request = validate(&cli).unwrap();
        assert_eq!(
            request,
            OperationRequest::Install {
                kind: ConnectorKind::Tds,
                package_path: "/pkg/demo".to_string(),
                merge_mode: None,
            }
        );
    }

    #[test]
    fn test_revalidating_a_valid_request_stays_valid() {
        let cli = parse(&[
            "-u", "http://server/", "-f", "/srv/site", "-c", "cms", "-p", "/pkg/demo",
        ]);

        let first = validate(&cli).unwrap();
        let second = validate(&cli).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_violations_are_collected() {
        // No url, no deploy folder, no connector: three independent errors
        let cli = parse(&[]);

        let errors = validate(&cli).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("URL")));
        assert!(errors.iter().any(|e| e.contains("deploy folder")));
        assert!(errors.iter().any(|e| e.contains("--connector")));
    }

    #[test]
    fn test_unknown_connector_kind() {
        let cli = parse(&[
            "-u", "http://server/", "-f", "/srv/site", "-c", "svn", "-p", "/pkg/demo",
        ]);

        let errors = validate(&cli).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'tds' or 'cms'"));
        assert!(errors[0].contains("svn"));
    }

    #[test]
    fn test_connector_without_package_path() {
        let cli = parse(&["-u", "http://server/", "-f", "/srv/site", "-c", "cms"]);

        let errors = validate(&cli).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("--package-path")));
    }

    #[test]
    fn test_publish_needs_no_connector() {
        let cli = parse(&[
            "-u",
            "http://server/",
            "-f",
            "/srv/site",
            "--publish",
            "--publish-mode",
            "incremental",
            "--publish-children",
        ]);

        match validate(&cli).unwrap() {
            OperationRequest::Publish(body) => {
                assert_eq!(body.mode, PublishMode::Incremental);
                assert!(body.recursive);
                assert_eq!(body.source_db, "master");
            }
            other => panic!("expected publish, got {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_mode_or_scope() {
        let cli = parse(&["-u", "http://server/", "-f", "/srv/site", "--publish"]);

        let errors = validate(&cli).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("--publish-mode")));
        assert!(errors.iter().any(|e| e.contains("--publish-root-item")));
    }

    #[test]
    fn test_publish_root_item_without_children_is_valid() {
        let cli = parse(&[
            "-u",
            "http://server/",
            "-f",
            "/srv/site",
            "--publish",
            "--publish-mode",
            "singleitem",
            "--publish-root-item",
            "home/products",
            "--publish-targets",
            "web, preview",
        ]);

        match validate(&cli).unwrap() {
            OperationRequest::Publish(body) => {
                assert_eq!(body.root_item.as_deref(), Some("home/products"));
                assert_eq!(
                    body.targets,
                    Some(vec!["web".to_string(), "preview".to_string()])
                );
                assert!(!body.recursive);
            }
            other => panic!("expected publish, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_mode_is_not_checked_up_front() {
        let cli = parse(&[
            "-u", "http://server/", "-f", "/srv/site", "-c", "cms", "-p", "/pkg/demo",
            "--merge-mode", "delete",
        ]);

        // Up-front validation accepts it; the lazy check rejects it
        let request = validate(&cli).unwrap();
        match request {
            OperationRequest::Install { merge_mode, .. } => {
                let err = check_merge_mode(merge_mode.as_deref()).unwrap_err();
                assert!(matches!(err, ClientError::InvalidMergeMode(_)));
            }
            other => panic!("expected install, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_mode_lazy_check_accepts_known_modes() {
        assert_eq!(check_merge_mode(None).unwrap(), None);
        assert_eq!(
            check_merge_mode(Some("CLEAR")).unwrap(),
            Some(MergeMode::Clear)
        );
    }
}
