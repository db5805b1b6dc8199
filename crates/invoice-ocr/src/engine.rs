//! Public entry point wiring the status store, worker pool and buffered jobs.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{broadcast, oneshot};

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent, StatusStore};
use crate::config::Settings;
use crate::error::{JobError, Result};
use crate::ocr::{HttpOcrClient, OcrClient};
use crate::pipeline::{FailureNotifier, InvoiceResult, LogNotifier, Orchestrator, Pipeline};
use crate::sanitize;
use crate::storage::InvoiceSink;
use crate::worker::buffered::{materialize, PendingBuffers};
use crate::worker::job::{new_job_id, FileInfo, SourceKind};
use crate::worker::{
    BufferSubmission, Cleanup, FileSubmission, JobRecord, JobState, QueuedJob, WorkerContext,
    WorkerPool,
};

/// Capacity of the progress event channel. Slow subscribers skip events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Error recorded for buffered jobs whose buffer expired before `trigger`.
pub const BUFFER_EXPIRED: &str = "buffer expired before trigger";

/// Asynchronous OCR job engine.
///
/// Cloning is cheap; clones share the same queue and status store.
#[derive(Clone)]
pub struct OcrEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: StatusStore,
    broadcaster: JobProgressBroadcaster,
    buffers: PendingBuffers,
    pool: WorkerPool,
    sink: Option<Arc<dyn InvoiceSink>>,
}

/// Builds an [`OcrEngine`], optionally replacing its collaborators.
pub struct OcrEngineBuilder {
    settings: Settings,
    client: Option<Arc<dyn OcrClient>>,
    notifier: Option<Arc<dyn FailureNotifier>>,
    sink: Option<Arc<dyn InvoiceSink>>,
}

impl OcrEngineBuilder {
    pub fn client(mut self, client: Arc<dyn OcrClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn InvoiceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts the workers. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<OcrEngine> {
        let settings = self.settings;
        let client: Arc<dyn OcrClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpOcrClient::new(&settings.ocr)?),
        };
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));

        let store = StatusStore::new(&settings.queue);
        let broadcaster = JobProgressBroadcaster::new(EVENT_CHANNEL_CAPACITY);
        let orchestrator = Orchestrator::new(client, &settings, notifier);

        let context = Arc::new(WorkerContext {
            pipeline: Pipeline::new(orchestrator)
                .with_heartbeat(settings.queue.heartbeat_step, settings.queue.heartbeat_interval),
            store: store.clone(),
            broadcaster: broadcaster.clone(),
            sink: self.sink.clone(),
        });
        let pool = WorkerPool::new(context, settings.queue.worker_count);

        let buffers = {
            let store = store.clone();
            let broadcaster = broadcaster.clone();
            PendingBuffers::with_expiry_handler(settings.queue.buffer_ttl, move |job_id, _| {
                expire_buffered_job(&store, &broadcaster, job_id)
            })
        };

        info!(
            "OCR engine ready: primary {}, fallback {}, {} retries, synthetic data {}",
            sanitize::redact_url(&settings.ocr.primary_url),
            settings
                .ocr
                .distinct_fallback()
                .map(sanitize::redact_url)
                .unwrap_or_else(|| "none".to_string()),
            settings.ocr.max_retries,
            if settings.allows_synthetic_data() {
                "allowed"
            } else {
                "disabled"
            }
        );

        Ok(OcrEngine {
            inner: Arc::new(EngineInner {
                store,
                broadcaster,
                buffers,
                pool,
                sink: self.sink,
            }),
        })
    }
}

impl OcrEngine {
    pub fn builder(settings: Settings) -> OcrEngineBuilder {
        OcrEngineBuilder {
            settings,
            client: None,
            notifier: None,
            sink: None,
        }
    }

    /// Engine with the HTTP client and default collaborators.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::builder(settings).build()
    }

    /// Queues a file already on disk. Processing starts as soon as a worker is free.
    pub async fn submit_file(&self, submission: FileSubmission) -> Result<String> {
        let metadata = tokio::fs::metadata(&submission.path)
            .await
            .map_err(|e| JobError::InvalidSubmission {
                path: submission.path.clone(),
                source: e,
            })?;

        let job_id = new_job_id();
        let record = JobRecord::queued(
            &job_id,
            FileInfo {
                filename: submission.filename.clone(),
                size: Some(metadata.len()),
                mime_type: submission.mime_type.clone(),
                source: SourceKind::File,
            },
        );

        let cleanup = if submission.delete_after {
            Cleanup::Remove
        } else {
            Cleanup::Keep
        };
        self.enqueue(
            QueuedJob {
                record,
                path: submission.path,
                filename: submission.filename,
                mime_type: submission.mime_type,
                cleanup,
                completion: None,
            },
            "Job queued for processing",
        )?;

        Ok(job_id)
    }

    /// Stores a buffered job. Nothing runs until [`OcrEngine::trigger`] is called.
    pub fn submit_buffer(&self, submission: BufferSubmission) -> String {
        let job_id = new_job_id();
        let record = JobRecord::queued(&job_id, submission.file_info());
        self.publish(record, "Job buffered until triggered");
        self.inner.buffers.insert(&job_id, submission);
        job_id
    }

    /// Runs a buffered job and waits for its terminal state.
    ///
    /// Unknown ids and consumed buffers fail with [`JobError::NotFound`]
    /// without touching the status store. An expired buffer also fails with
    /// `NotFound`, and its job is marked as errored.
    pub async fn trigger(&self, job_id: &str) -> std::result::Result<InvoiceResult, JobError> {
        let submission = self
            .inner
            .buffers
            .take(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let record = match self.inner.store.get_status(job_id) {
            record if record.status == JobState::NotFound => {
                JobRecord::queued(job_id, submission.file_info())
            }
            record => record,
        };

        let temp_path = match materialize(job_id, &submission) {
            Ok(path) => path,
            Err(e) => {
                self.publish(record.failed(e.to_string()), "Buffered job could not be written");
                return Err(e);
            }
        };
        let (completion, done) = oneshot::channel();
        self.enqueue(
            QueuedJob {
                record,
                path: temp_path.to_path_buf(),
                filename: submission.filename,
                mime_type: submission.mime_type,
                cleanup: Cleanup::Temporary(temp_path),
                completion: Some(completion),
            },
            "Buffered job triggered",
        )?;

        match done.await {
            Ok(Ok(invoice)) => Ok(invoice),
            Ok(Err(message)) => Err(JobError::Processing {
                job_id: job_id.to_string(),
                message,
            }),
            Err(_) => Err(JobError::Processing {
                job_id: job_id.to_string(),
                message: "worker stopped before the job finished".to_string(),
            }),
        }
    }

    /// Current status record, or a `not_found` record.
    pub fn status(&self, job_id: &str) -> JobRecord {
        self.inner.buffers.run_pending_tasks();
        self.inner.store.get_status(job_id)
    }

    pub fn list_statuses(&self) -> Vec<JobRecord> {
        self.inner.buffers.run_pending_tasks();
        self.inner.store.list_statuses()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Completed invoice from the status store, else from the invoice sink.
    pub async fn find_invoice(&self, job_id: &str) -> Result<Option<InvoiceResult>> {
        if let Some(result) = self.inner.store.get_status(job_id).result {
            return Ok(Some(result));
        }
        match self.inner.sink {
            Some(ref sink) => Ok(sink.fetch(job_id).await?),
            None => Ok(None),
        }
    }

    /// Closes the queue and waits for queued jobs to finish.
    pub async fn shutdown(&self) {
        self.inner.pool.shutdown().await;
    }

    fn enqueue(&self, job: QueuedJob, message: &str) -> std::result::Result<(), JobError> {
        let record = job.record.clone();
        self.publish(record.clone(), message);
        if let Err(e) = self.inner.pool.submit(job) {
            self.publish(record.failed(e.to_string()), "Job could not be queued");
            return Err(e);
        }
        Ok(())
    }

    fn publish(&self, record: JobRecord, message: &str) {
        self.inner
            .broadcaster
            .send(JobProgressEvent::from_record(&record, message));
        self.inner.store.set_status(record);
    }
}

/// Marks a buffered job as failed once its buffer expired untriggered.
///
/// Only a still-queued record is replaced, so repeated notifications for the
/// same buffer write once.
fn expire_buffered_job(store: &StatusStore, broadcaster: &JobProgressBroadcaster, job_id: &str) {
    let record = store.get_status(job_id);
    if record.status != JobState::Queued {
        return;
    }
    warn!("Buffered job {} expired before it was triggered", job_id);
    let record = record.failed(BUFFER_EXPIRED);
    broadcaster.send(JobProgressEvent::from_record(&record, "Buffered job expired"));
    store.set_status(record);
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("jobs", &self.inner.store.len())
            .field("shut_down", &self.inner.pool.is_shutdown())
            .finish()
    }
}
