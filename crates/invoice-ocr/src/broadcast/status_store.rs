//! Bounded in-memory store of job status records.

use std::collections::HashMap;

use moka::sync::Cache;

use crate::config::QueueSettings;
use crate::worker::job::{JobRecord, JobState};

/// Map from job id to its latest status record.
///
/// Writes replace the whole record (last writer wins). Entries are evicted
/// once `max_capacity` is exceeded or `time_to_live` has passed since the
/// last write. Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct StatusStore {
    cache: Cache<String, JobRecord>,
}

impl StatusStore {
    pub fn new(settings: &QueueSettings) -> Self {
        let cache = Cache::builder()
            .max_capacity(settings.status_capacity)
            .time_to_live(settings.status_ttl)
            .build();
        Self { cache }
    }

    pub fn set_status(&self, record: JobRecord) {
        self.cache.insert(record.id.clone(), record);
    }

    /// Returns the record for `id`, or a `not_found` record.
    pub fn get_status(&self, id: &str) -> JobRecord {
        self.cache
            .get(id)
            .unwrap_or_else(|| JobRecord::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    /// Point-in-time snapshot of every live record, oldest submission first.
    pub fn list_statuses(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.cache.iter().map(|(_, record)| record).collect();
        records.sort_by_key(|r| r.queued_at);
        records
    }

    /// Number of live records per state.
    pub fn counts(&self) -> HashMap<JobState, usize> {
        let mut counts = HashMap::new();
        for (_, record) in self.cache.iter() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    /// Applies pending evictions. Mostly useful in tests.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
