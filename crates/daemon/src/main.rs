// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! thrumd: the Thrum daemon binary.

use thrum_daemon::config::DaemonConfig;
use thrum_daemon::{startup, LifecycleError, ThrumPaths};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("startup failed: {e}");
        eprintln!("thrumd: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), LifecycleError> {
    let cwd = std::env::current_dir()?;
    let paths = ThrumPaths::discover(&cwd)?;
    std::fs::create_dir_all(paths.var_dir())?;

    // File log with env-filtered level; stderr carries startup errors.
    let file_appender =
        tracing_appender::rolling::never(paths.var_dir(), "daemon.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let config = DaemonConfig::load(&paths.config_path())?;
    let daemon = startup(paths, config).await?;

    // READY handshake for supervising processes.
    println!("READY ws_port={}", daemon.ws_port);
    info!("daemon ready");

    wait_for_signal().await;
    daemon.shutdown().await;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = term.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
