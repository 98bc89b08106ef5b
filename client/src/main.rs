//! pkgstream - entry point
//!
//! Flow: parse and validate the command line, deploy the connector, run
//! the operation while following its stream, map the result to the exit
//! code.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info, warn};

use pkgstream::cli::CliOptions;
use pkgstream::deploy;
use pkgstream::errors::ClientError;
use pkgstream::logs::init_logging;
use pkgstream::outcome::ExitOutcome;
use pkgstream::request::{validate, OperationRequest};
use pkgstream::stream::{run_operation, StreamOptions};

#[tokio::main]
async fn main() {
    let cli = match CliOptions::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = e.print();
                std::process::exit(0);
            }
            eprintln!("{e}");
            std::process::exit(ExitOutcome::ValidationFailed.code());
        }
    };

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let code = match execute(cli).await {
        Ok(outcome) => outcome.code(),
        Err(e) => {
            error!("Unexpected error: {:#}", e);
            ExitOutcome::UnhandledFailure.code()
        }
    };
    std::process::exit(code);
}

async fn execute(cli: CliOptions) -> anyhow::Result<ExitOutcome> {
    let request = match validate(&cli) {
        Ok(request) => request,
        Err(errors) => {
            for message in &errors {
                error!("{} Try `pkgstream --help` for more information.", message);
            }
            return Ok(ExitOutcome::ValidationFailed);
        }
    };

    // Validation guarantees these are present
    let deploy_folder = cli.deploy_folder.clone().unwrap_or_default();
    let base_url = cli.url.clone().unwrap_or_default();

    if !deploy_folder.is_dir() {
        error!("Deploy folder {} not found.", deploy_folder.display());
        return Ok(ExitOutcome::ConnectorDeployFailed);
    }

    let artifacts_dir = match &cli.artifacts_dir {
        Some(dir) => dir.clone(),
        None => default_artifacts_dir()?,
    };
    if let Err(e) = deploy::deploy_connector(&artifacts_dir, &deploy_folder) {
        error!("Connector deployment failed: {}", e);
        return Ok(ExitOutcome::ConnectorDeployFailed);
    }

    if let OperationRequest::Install { package_path, .. } = &request {
        info!("Initializing update package installation: {}", package_path);
    }

    let options = StreamOptions {
        base_url,
        ssl: cli.ssl,
        timeout_secs: cli.timeout_secs,
    };

    let outcome = match run_operation(&options, &request).await {
        Ok(summary) => {
            if summary.is_success() {
                info!("Operation completed, {} messages received.", summary.messages);
            } else {
                error!(
                    "Remote operation failed: {} error(s){}.",
                    summary.errors.len(),
                    if summary.saw_fatal { ", fatal" } else { "" }
                );
            }
            ExitOutcome::from_summary(&summary)
        }
        Err(e) => {
            report_client_error(&e);
            ExitOutcome::from_client_error(&e)
        }
    };

    if cli.remove_connector {
        if let Err(e) = deploy::remove_connector(&deploy_folder) {
            warn!("{}", e);
        }
    }

    Ok(outcome)
}

fn report_client_error(e: &ClientError) {
    match e {
        ClientError::Transport {
            reason,
            code,
            body_snippet,
        } => {
            match code {
                Some(code) => error!("Transport error ({}): {}", code, reason),
                None => error!("Transport error: {}", reason),
            }
            if let Some(body) = body_snippet {
                if !body.is_empty() {
                    error!("Server response: {}", body);
                }
            }
        }
        other => error!("{}", other),
    }
}

fn default_artifacts_dir() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}
