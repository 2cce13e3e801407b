//! keywatchd: daemon exposing global hotkey monitoring
//!
//! Registers the configured primary hotkey, starts the system-wide event
//! monitor, and logs subsystem activity until it receives SIGTERM/SIGINT.
//! On platforms without global hotkey support (or with the permission
//! missing) it keeps running so the caller can grant access and restart.

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use keywatch::config::Config;
use keywatch::lifecycle::{HotkeyController, ShutdownSignal};
use keywatch::HotkeyError;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keywatchd starting"
    );

    // Load configuration
    let config = Config::load()?;
    info!(primary = ?config.primary.map(|c| c.to_string()), "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Acquire the process-wide hotkey resources
    let controller = HotkeyController::native()?;

    // Register the primary hotkey before the monitor starts; it becomes
    // active once the monitor runs
    if let Some(combo) = config.primary {
        let pressed = combo;
        if let Err(e) = controller.register_primary(combo, move || {
            info!(combo = %pressed, "primary hotkey pressed");
        }) {
            warn!(%combo, error = %e, "primary hotkey registration failed");
        }
    }

    // Start the event monitor
    match controller.start() {
        Ok(()) => {}
        Err(HotkeyError::PermissionDenied) => {
            warn!("input monitoring permission missing - grant Accessibility access and restart");
        }
        Err(e) => {
            warn!(error = %e, "continuing without global hotkey monitoring");
        }
    }

    let mut events = controller.subscribe_events();
    let mut monitor = controller.subscribe_monitor();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Log subsystem activity
        _ = async {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        info!(%event, "subsystem event");
                        // Machine-readable form for log scrapers
                        if let Ok(json) = serde_json::to_string(&event) {
                            debug!(%json, "subsystem event json");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("event stream closed");
        }

        // Log monitor state transitions (including tap invalidation)
        _ = async {
            while monitor.changed().await.is_ok() {
                let state = *monitor.borrow();
                info!(?state, "monitor state changed");
            }
        } => {
            info!("monitor watch closed");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    controller.shutdown();

    info!("keywatchd stopped");

    Ok(())
}
