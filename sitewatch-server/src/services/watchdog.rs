use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::models::Location;
use crate::services::state_store::StateStore;

/// Flips locations offline once their device has been silent for too long.
/// It is the only writer that demotes connectivity on elapsed time alone.
pub struct Watchdog {
    store: Arc<StateStore>,
    timeout: time::Duration,
    period: Duration,
}

impl Watchdog {
    pub fn new(store: Arc<StateStore>, timeout: Duration, period: Duration) -> Self {
        Self {
            store,
            timeout: time::Duration::try_from(timeout).unwrap_or(time::Duration::MAX),
            period,
        }
    }

    /// One scan over all locations. Warns once per online-to-offline edge.
    pub fn sweep(&self) -> Vec<Location> {
        let expired = self.store.expire_stale(self.timeout);

        for location in &expired {
            tracing::warn!(
                location = %location,
                timeout_secs = self.timeout.whole_seconds(),
                "device connection timed out"
            );
        }

        expired
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(period = ?self.period, "liveness watchdog started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("liveness watchdog stopped");
    }
}
