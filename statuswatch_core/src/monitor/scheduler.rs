use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use super::Monitor;

/// Tracks when the last scheduled sweep finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    last_finished: Option<DateTime<Utc>>,
}

impl SweepSchedule {
    /// Due once `interval` has passed since the last sweep finished. The
    /// interval is passed in on every check so a reload applies at once.
    pub fn is_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        let Some(last) = self.last_finished else {
            return true;
        };
        match (now - last).to_std() {
            Ok(elapsed) => elapsed >= interval,
            // Wall clock stepped back; the throttle still guards each endpoint.
            Err(_) => true,
        }
    }

    pub fn finished(&mut self, at: DateTime<Utc>) {
        self.last_finished = Some(at);
    }

    pub fn last_finished(&self) -> Option<DateTime<Utc>> {
        self.last_finished
    }
}

/// Sweeps when the configured refresh interval has passed, then sleeps one
/// tick. Results are stamped before the sweep finishes, so measuring the
/// interval from the finish keeps every result past the throttle window.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, tick: Duration) -> Self {
        Self { monitor, tick }
    }

    /// Runs until `shutdown` flips. A sweep that has started always runs to
    /// completion.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut schedule = SweepSchedule::default();

        info!(tick_seconds = self.tick.as_secs_f64(), "Scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let interval = self.monitor.configuration().targets.refresh_interval();
            if schedule.is_due(self.monitor.clock().now(), interval) {
                self.monitor.sweep().await;
                schedule.finished(self.monitor.clock().now());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Scheduler stopped");
    }
}
