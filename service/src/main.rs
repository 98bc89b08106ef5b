//! pkgstream service - entry point
//!
//! Hosts the connector endpoints for streaming package installation and
//! publishing.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use pkgstream_service::logs::init_logging;
use pkgstream_service::options::ServiceOptions;
use pkgstream_service::server::serve::serve;
use pkgstream_service::server::state::ServiceState;

#[tokio::main]
async fn main() {
    let options = ServiceOptions::parse();

    if let Err(e) = init_logging(&options.log_level) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!("Running pkgstream service with options: {:?}", options);

    let state = Arc::new(ServiceState::from_options(&options));
    let handle = match serve(&options, state, await_shutdown_signal()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start service: {}", e);
            std::process::exit(1);
        }
    };

    match handle.await {
        Ok(Ok(())) => info!("Service stopped"),
        Ok(Err(e)) => {
            error!("Service error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Service task panicked: {}", e);
            std::process::exit(1);
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
