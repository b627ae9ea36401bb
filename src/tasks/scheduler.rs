use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::core::state::AppState;
use crate::tasks::expiry;

/// Runs the expiry watchdog until a shutdown signal arrives. The tick is
/// deliberately short so a section never runs meaningfully past its limit;
/// clients report expiry too, and the duplicate report is harmless.
pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watchdog = tokio::spawn(expiry_worker(state.clone(), shutdown_rx));

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    if let Err(err) = watchdog.await {
        tracing::error!(error = %err, "Background task join failed");
    }

    Ok(())
}

async fn expiry_worker(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let tick = Duration::from_millis(state.settings().watchdog().tick_interval_ms);

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(err) = expiry::close_due_sections(&state).await {
            tracing::error!(error = %err, "Expiry sweep failed");
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(tick) => {}
        }
    }
}
