use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Highest progress value reported before a job reaches a terminal state.
pub const PROGRESS_CAP: u8 = 90;

/// Receives progress updates (0..=`PROGRESS_CAP`) while a job is processing.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: u8, message: &str);

    /// Last reported value. Used by the heartbeat to step forward from it.
    fn current(&self) -> u8 {
        0
    }
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Periodic progress ticker tied to a scope.
///
/// Every `interval` the reporter is advanced by `step`, never past
/// `PROGRESS_CAP`. The timer task is aborted when the guard is dropped, so
/// every exit path of the owning scope stops it.
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Starts the ticker. Must be called from within a tokio runtime.
    pub fn start(reporter: Arc<dyn ProgressReporter>, step: u8, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = reporter.current();
                if current >= PROGRESS_CAP {
                    continue;
                }
                let next = current.saturating_add(step).min(PROGRESS_CAP);
                reporter.report(next, "Waiting for OCR response...");
            }
        });
        Self { handle }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
