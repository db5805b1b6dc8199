use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent, StatusStore};
use crate::pipeline::{InvoiceResult, ProgressReporter, PROGRESS_CAP};
use crate::worker::job::JobRecord;

/// Owns the status record of one job while a worker runs it.
///
/// Every write goes through one lock, so progress never moves backwards and
/// nothing is written after the terminal record.
pub struct JobTracker {
    state: Mutex<TrackerState>,
    store: StatusStore,
    broadcaster: JobProgressBroadcaster,
}

struct TrackerState {
    record: JobRecord,
    finished: bool,
}

impl JobTracker {
    pub fn new(record: JobRecord, store: StatusStore, broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                record,
                finished: false,
            }),
            store,
            broadcaster,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Moves the job into `processing` at 0 %.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.finished {
            return;
        }
        let record = state.record.processing(0);
        self.publish(&mut state, record, "Processing started");
    }

    pub fn complete(&self, result: InvoiceResult) -> JobRecord {
        let mut state = self.lock();
        let record = state.record.completed(result);
        state.finished = true;
        self.publish(&mut state, record, "Processing completed");
        state.record.clone()
    }

    pub fn fail(&self, error: impl Into<String>) -> JobRecord {
        let mut state = self.lock();
        let record = state.record.failed(error);
        state.finished = true;
        self.publish(&mut state, record, "Processing failed");
        state.record.clone()
    }

    fn publish(&self, state: &mut TrackerState, record: JobRecord, message: &str) {
        self.broadcaster
            .send(JobProgressEvent::from_record(&record, message));
        self.store.set_status(record.clone());
        state.record = record;
    }
}

impl ProgressReporter for JobTracker {
    fn report(&self, percent: u8, message: &str) {
        let mut state = self.lock();
        let percent = percent.min(PROGRESS_CAP);
        if state.finished || percent < state.record.progress {
            return;
        }
        debug!("Job {}: {}% {}", state.record.id, percent, message);
        let record = state.record.processing(percent);
        self.publish(&mut state, record, message);
    }

    fn current(&self) -> u8 {
        self.lock().record.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueSettings;
    use crate::pipeline::{normalize, PayloadSource};
    use crate::worker::job::{FileInfo, JobState, SourceKind};
    use chrono::Utc;
    use serde_json::json;

    fn tracker() -> (JobTracker, StatusStore, JobProgressBroadcaster) {
        let store = StatusStore::new(&QueueSettings::default());
        let broadcaster = JobProgressBroadcaster::new(64);
        let record = JobRecord::queued(
            "job-1",
            FileInfo {
                filename: "a.pdf".to_string(),
                size: Some(1),
                mime_type: "application/pdf".to_string(),
                source: SourceKind::File,
            },
        );
        store.set_status(record.clone());
        (
            JobTracker::new(record, store.clone(), broadcaster.clone()),
            store,
            broadcaster,
        )
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let (tracker, store, _) = tracker();
        tracker.start();
        tracker.report(40, "a");
        tracker.report(20, "stale");
        assert_eq!(store.get_status("job-1").progress, 40);

        tracker.report(100, "too far");
        let record = store.get_status("job-1");
        assert_eq!(record.progress, PROGRESS_CAP);
        assert_eq!(record.status, JobState::Processing);
        assert_eq!(tracker.current(), PROGRESS_CAP);
    }

    #[test]
    fn test_no_writes_after_terminal() {
        let (tracker, store, broadcaster) = tracker();
        let mut rx = broadcaster.subscribe();
        tracker.start();
        tracker.report(50, "half");

        let record = tracker.fail("upstream down");
        assert_eq!(record.status, JobState::Error);
        assert_eq!(record.progress, 0);

        tracker.report(60, "late heartbeat");
        tracker.start();
        let stored = store.get_status("job-1");
        assert_eq!(stored.status, JobState::Error);
        assert_eq!(stored.progress, 0);

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            statuses.push(event.status);
        }
        assert_eq!(
            statuses,
            vec![JobState::Processing, JobState::Processing, JobState::Error]
        );
    }

    #[test]
    fn test_complete_sets_full_progress() {
        let (tracker, store, _) = tracker();
        tracker.start();
        let result = InvoiceResult {
            job_id: "job-1".to_string(),
            filename: "a.pdf".to_string(),
            processed_at: Utc::now(),
            source: PayloadSource::Primary,
            attempts: 1,
            ocr_data: normalize(json!({})),
        };
        let record = tracker.complete(result);
        assert_eq!(record.progress, 100);
        assert_eq!(store.get_status("job-1").status, JobState::Completed);
    }
}
