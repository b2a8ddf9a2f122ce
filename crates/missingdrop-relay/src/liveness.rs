//! Periodic mark-and-probe sweep over all hub connections.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::hub::RelayHub;

/// Spawn the liveness task. The first sweep runs one `period` after start;
/// a connection that stays silent for a full period after being probed is
/// closed by the following sweep.
pub fn spawn_liveness_monitor(hub: RelayHub, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = hub.sweep_liveness().await;
            tracing::debug!(
                connections = report.probed,
                reaped = report.reaped,
                "Liveness sweep"
            );
        }
    })
}
