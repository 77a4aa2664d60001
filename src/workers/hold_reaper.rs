use crate::services::InventoryService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

/// Run the hold reaper loop. Every tick reclaims the stock behind expired
/// reservation holds so crashed sagas never pin inventory past the TTL.
pub async fn run_hold_reaper(
    inventory: Arc<InventoryService>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(tick);
    tracing::info!(interval_ms = tick.as_millis() as u64, "Hold reaper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match inventory.reap_expired_holds().await {
                    Ok(0) => tracing::debug!("Reaper tick: no expired holds"),
                    Ok(reaped) => tracing::info!(reaped, "Reaper tick: reclaimed expired holds"),
                    Err(e) => tracing::error!(error = %e, "Reaper tick failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("Hold reaper stopping");
                    return;
                }
            }
        }
    }
}
