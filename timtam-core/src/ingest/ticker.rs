use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::meeting::OrchestratorManager;
use crate::utils::now_ms;

/// Drain meeting queues on a fixed period so queued Grasps still run while
/// nobody is speaking.
pub fn spawn_ticker(
    manager: Arc<OrchestratorManager>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "ticker.started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    let executed = manager.process_all_queues(now_ms()).await;
                    if executed > 0 {
                        debug!(executed, "ticker.queues.processed");
                    }
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("ticker.stopped");
    })
}
