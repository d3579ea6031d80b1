//! fieldbot - Entry Point
//!
//! Wires the agent together: environment, logging, liveness endpoint,
//! console input, signal handling, and the connection supervisor. Runs
//! against the in-process simulated world; a real protocol adapter
//! implements [`fieldbot::GameConnector`] and replaces the connector
//! here.

use fieldbot::sim::{SimCombat, SimConnector, SimNavigator};
use fieldbot::{liveness, Config, Supervisor};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(true)
        .init();

    let config = Arc::new(Config::from_env()?);
    info!(
        "fieldbot v{} ({} profile), target {}",
        env!("CARGO_PKG_VERSION"),
        config.profile.as_str(),
        config.address()
    );

    // Liveness endpoint for the hosting platform's monitor.
    let liveness_port = config.liveness_port;
    tokio::spawn(async move {
        if let Err(e) = liveness::serve(liveness_port).await {
            error!("Liveness server failed: {e}");
        }
    });

    let console_rx = spawn_console_reader();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let connector = SimConnector::demo();
    let nav = SimNavigator::new();
    let combat = SimCombat::new();
    let supervisor = Supervisor::new(connector, nav, combat, config, console_rx);

    supervisor.run(shutdown_rx).await;
    info!("Goodbye");
    Ok(())
}

/// Forward stdin lines to the supervisor's command surface.
fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Translate SIGINT/SIGTERM into the shutdown signal. The supervisor
/// then stops behaviors, neutralizes controls, and disconnects cleanly.
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut terminate =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(signal) => signal,
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {e}");
                        let _ = ctrl_c.await;
                        info!("Shutdown signal received");
                        let _ = shutdown_tx.send(true);
                        return;
                    }
                };
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
