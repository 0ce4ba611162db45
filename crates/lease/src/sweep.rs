//! Periodic expiry sweep.

use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::LeaseManager;

/// Drives [`LeaseManager::sweep`] on a fixed interval.
///
/// Sweeps never overlap: one runs to completion before the next tick
/// is considered, and ticks that fell due in the meantime are skipped,
/// not queued, so a slow device cannot pile up concurrent sweeps.
pub struct ExpirySweeper {
    manager: Arc<LeaseManager>,
}

impl ExpirySweeper {
    /// Sweeper for `manager`, using its configured interval.
    pub fn new(manager: Arc<LeaseManager>) -> Self {
        Self { manager }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Long-running; spawn it as its own task.
    pub async fn run(self, shutdown: CancellationToken) {
        let sweep_interval = self.manager.config().sweep_interval;
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; skip it
        // so startup doesn't sweep before the rest of the service is up.
        ticker.tick().await;

        info!(interval = ?sweep_interval, "expiry sweeper started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("expiry sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let now = self.manager.clock().now();
                    match self.manager.sweep(now).await {
                        Ok(report) => {
                            debug!(
                                revoked = report.revoked,
                                failed = report.failed,
                                skipped = report.skipped,
                                "sweep tick done"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "sweep tick failed");
                        }
                    }
                    if started.elapsed() >= sweep_interval {
                        warn!(
                            elapsed = ?started.elapsed(),
                            "sweep overran its interval, skipping missed ticks"
                        );
                    }
                }
            }
        }
    }
}
