//! In-memory documents held back until their job is triggered.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::notification::RemovalCause;
use moka::sync::Cache;
use tempfile::TempPath;

use crate::error::JobError;
use crate::worker::job::BufferSubmission;

const TEMP_PREFIX: &str = "invoice-ocr-";

/// Called with the job id and submission of a buffer that expired untriggered.
pub type ExpiryHandler = Arc<dyn Fn(&str, BufferSubmission) + Send + Sync>;

#[derive(Clone)]
struct PendingBuffer {
    submission: BufferSubmission,
    expires_at: Instant,
}

/// Buffers keyed by job id. Entries expire `ttl` after submission.
///
/// Expiry is checked on `take` as well as by cache housekeeping, so a stale
/// buffer is never handed out even before it has been evicted.
#[derive(Clone)]
pub struct PendingBuffers {
    cache: Cache<String, PendingBuffer>,
    ttl: Duration,
    on_expired: Option<ExpiryHandler>,
}

impl PendingBuffers {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).build(),
            ttl,
            on_expired: None,
        }
    }

    /// Like [`PendingBuffers::new`], calling `on_expired` for every buffer
    /// that expires before it is taken.
    pub fn with_expiry_handler<F>(ttl: Duration, on_expired: F) -> Self
    where
        F: Fn(&str, BufferSubmission) + Send + Sync + 'static,
    {
        let on_expired: ExpiryHandler = Arc::new(on_expired);
        let listener = on_expired.clone();
        let cache = Cache::builder()
            .time_to_live(ttl)
            .eviction_listener(move |job_id: Arc<String>, entry: PendingBuffer, cause| {
                if matches!(cause, RemovalCause::Expired) {
                    listener(job_id.as_str(), entry.submission);
                }
            })
            .build();
        Self {
            cache,
            ttl,
            on_expired: Some(on_expired),
        }
    }

    pub fn insert(&self, job_id: &str, submission: BufferSubmission) {
        let entry = PendingBuffer {
            submission,
            expires_at: Instant::now() + self.ttl,
        };
        self.cache.insert(job_id.to_string(), entry);
    }

    /// Removes and returns the buffer for `job_id`. A buffer can be taken once.
    pub fn take(&self, job_id: &str) -> Option<BufferSubmission> {
        let entry = self.cache.remove(job_id)?;
        if Instant::now() >= entry.expires_at {
            if let Some(ref on_expired) = self.on_expired {
                on_expired(job_id, entry.submission);
            }
            return None;
        }
        Some(entry.submission)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.cache.contains_key(job_id)
    }

    /// Evicts expired buffers now, running the expiry handler for each.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }
}

/// Writes the buffer to a uniquely named temporary file.
///
/// The file keeps the original extension so the OCR service can sniff the
/// format from the name. It is deleted when the returned path is closed or
/// dropped.
pub fn materialize(job_id: &str, submission: &BufferSubmission) -> Result<TempPath, JobError> {
    let suffix = Path::new(&submission.filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let to_job_error = |source| JobError::Materialize {
        job_id: job_id.to_string(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile()
        .map_err(to_job_error)?;
    file.write_all(&submission.bytes).map_err(to_job_error)?;
    file.flush().map_err(to_job_error)?;

    Ok(file.into_temp_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_buffer() {
        let buffers = PendingBuffers::new(Duration::from_secs(60));
        buffers.insert("job-1", BufferSubmission::new(b"abc".to_vec(), "a.png"));
        assert!(buffers.contains("job-1"));

        let taken = buffers.take("job-1").unwrap();
        assert_eq!(taken.bytes, b"abc");
        assert!(buffers.take("job-1").is_none());
        assert!(!buffers.contains("job-1"));
    }

    #[test]
    fn test_buffers_expire() {
        let buffers = PendingBuffers::new(Duration::from_millis(30));
        buffers.insert("job-1", BufferSubmission::new(b"abc".to_vec(), "a.png"));
        std::thread::sleep(Duration::from_millis(80));
        assert!(buffers.take("job-1").is_none());
    }

    #[test]
    fn test_expired_buffer_is_reported() {
        let expired = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = expired.clone();
        let buffers = PendingBuffers::with_expiry_handler(
            Duration::from_millis(30),
            move |job_id, submission| {
                seen.lock().unwrap().push((job_id.to_string(), submission.filename));
            },
        );
        buffers.insert("job-1", BufferSubmission::new(b"abc".to_vec(), "a.png"));
        buffers.insert("job-2", BufferSubmission::new(b"def".to_vec(), "b.png"));
        std::thread::sleep(Duration::from_millis(80));

        assert!(buffers.take("job-1").is_none());
        buffers.run_pending_tasks();

        let mut expired = expired.lock().unwrap().clone();
        expired.sort();
        expired.dedup();
        assert_eq!(
            expired,
            vec![
                ("job-1".to_string(), "a.png".to_string()),
                ("job-2".to_string(), "b.png".to_string()),
            ]
        );
    }

    #[test]
    fn test_taken_buffer_is_not_reported() {
        let expired = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let seen = expired.clone();
        let buffers = PendingBuffers::with_expiry_handler(
            Duration::from_millis(30),
            move |job_id, _| seen.lock().unwrap().push(job_id.to_string()),
        );
        buffers.insert("job-1", BufferSubmission::new(b"abc".to_vec(), "a.png"));
        assert!(buffers.take("job-1").is_some());

        std::thread::sleep(Duration::from_millis(80));
        buffers.run_pending_tasks();
        assert!(expired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_materialize_writes_unique_files() {
        let submission = BufferSubmission::new(b"%PDF-1.4".to_vec(), "invoice.pdf");
        let first = materialize("job-1", &submission).unwrap();
        let second = materialize("job-1", &submission).unwrap();

        assert_ne!(first.to_path_buf(), second.to_path_buf());
        assert_eq!(std::fs::read(&first).unwrap(), b"%PDF-1.4");
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("pdf"));

        let path = first.to_path_buf();
        first.close().unwrap();
        assert!(!path.exists());
    }
}
