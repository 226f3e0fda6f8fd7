//! Refresh rate policy daemon.
//!
//! Loads the panel's display configs, builds the refresh rate engine and
//! serves it to the compositor and the display manager over a Unix socket.

use refresh_rate_policy::config::Config;
use refresh_rate_policy::error::{DaemonError, IpcError};
use refresh_rate_policy::ipc_server::DaemonState;
use refresh_rate_policy::logging;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Graceful shutdown timeout in seconds
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// Delay before rebinding the socket after a server failure
const IPC_RESTART_DELAY_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let _log_guard = logging::init_logging().map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("Refresh rate policy daemon starting...");

    let result = run_daemon().await;

    match &result {
        Ok(()) => info!("Refresh rate policy daemon shut down gracefully"),
        Err(e) => error!("Refresh rate policy daemon error: {}", e),
    }

    result
}

async fn run_daemon() -> Result<(), DaemonError> {
    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path)?;
    info!("Configuration loaded from {:?}", config_path);

    let configs = config.build_engine()?;
    let daemon_state = Arc::new(DaemonState::new(configs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let ipc_state = Arc::clone(&daemon_state);
    let ipc_shutdown_rx = shutdown_rx.clone();
    let socket_path = config.socket_path.clone();
    let ipc_handle = tokio::spawn(async move {
        run_ipc_server_with_restart(ipc_state, socket_path, ipc_shutdown_rx).await
    });

    info!("Refresh rate policy daemon initialized and running");

    let mut shutdown_rx_main = shutdown_rx.clone();
    shutdown_rx_main.changed().await.ok();

    info!("Shutdown signal received, stopping tasks...");

    let shutdown_timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
    let _ = tokio::time::timeout(shutdown_timeout, ipc_handle).await;

    info!("All tasks stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT, then broadcast shutdown.
#[cfg(unix)]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

#[cfg(not(unix))]
async fn setup_signal_handlers(
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Keep the IPC server up until shutdown, rebinding after failures.
async fn run_ipc_server_with_restart(
    state: Arc<DaemonState>,
    socket_path: String,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("IPC server shutting down");
                    break;
                }
            }
            result = run_ipc_server_inner(Arc::clone(&state), &socket_path) => {
                match result {
                    Ok(()) => break,
                    Err(e) => {
                        error!(
                            "IPC server error: {}, restarting in {} seconds",
                            e, IPC_RESTART_DELAY_SECS
                        );
                        tokio::time::sleep(Duration::from_secs(IPC_RESTART_DELAY_SECS)).await;
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
async fn run_ipc_server_inner(state: Arc<DaemonState>, socket_path: &str) -> Result<(), IpcError> {
    use refresh_rate_policy::ipc_server::IpcServer;

    let server = IpcServer::new(socket_path).await?;
    info!("IPC server listening on {:?}", server.socket_path());
    server.run(state).await
}

#[cfg(not(unix))]
async fn run_ipc_server_inner(_state: Arc<DaemonState>, _socket_path: &str) -> Result<(), IpcError> {
    tracing::warn!("IPC server not available on this platform");
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
