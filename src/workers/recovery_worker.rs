use crate::services::RecoveryService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

/// Run the recovery worker loop. Every tick sweeps stuck sagas: advance the
/// ones that can move, give up on the ones past the give-up threshold, leave
/// the rest.
pub async fn run_recovery_worker(
    recovery: Arc<RecoveryService>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(tick);
    tracing::info!(interval_ms = tick.as_millis() as u64, "Recovery worker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match recovery.run_once().await {
                    Ok(stats) if stats.scanned == 0 => {
                        tracing::debug!("Recovery tick: nothing stuck");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Recovery tick failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Recovery worker stopping");
                    return;
                }
            }
        }
    }
}
