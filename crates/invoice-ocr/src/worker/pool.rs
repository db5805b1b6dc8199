use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tempfile::TempPath;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::broadcast::{JobProgressBroadcaster, StatusStore};
use crate::error::JobError;
use crate::pipeline::{InvoiceResult, Pipeline, PipelineContext};
use crate::sanitize;
use crate::storage::InvoiceSink;
use crate::worker::job::JobRecord;
use crate::worker::tracker::JobTracker;

/// Terminal outcome handed back to a caller awaiting a job.
pub type JobOutcome = Result<InvoiceResult, String>;

/// What happens to the job's file once it reaches a terminal state.
pub enum Cleanup {
    Keep,
    Remove,
    Temporary(TempPath),
}

/// A job waiting in the queue.
pub struct QueuedJob {
    pub record: JobRecord,
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
    pub cleanup: Cleanup,
    pub completion: Option<oneshot::Sender<JobOutcome>>,
}

/// Everything a worker needs to run a job, shared by all workers.
pub struct WorkerContext {
    pub pipeline: Pipeline,
    pub store: StatusStore,
    pub broadcaster: JobProgressBroadcaster,
    pub sink: Option<Arc<dyn InvoiceSink>>,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// Fixed set of tokio workers draining one unbounded queue.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers. Must be called from within a tokio runtime.
    pub fn new(context: Arc<WorkerContext>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedJob>();
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&context),
                ))
            })
            .collect();

        info!("Started {} workers", worker_count);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    pub fn submit(&self, job: QueuedJob) -> Result<(), JobError> {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sender = guard.as_ref().ok_or(JobError::PoolClosed)?;
        sender.send(job).map_err(|_| JobError::PoolClosed)
    }

    pub fn is_shutdown(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Closes the queue and waits for the workers to drain it.
    pub async fn shutdown(&self) {
        info!("Shutting down worker pool...");
        // Dropping the sender lets workers exit once the queue is empty
        match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let workers: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(worker_id: usize, receiver: SharedReceiver, context: Arc<WorkerContext>) {
    debug!("Worker {} started", worker_id);

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        match job {
            Some(job) => {
                debug!("Worker {} processing job {}", worker_id, job.record.id);
                process_job(&context, job).await;
            }
            None => {
                debug!("Worker {} job channel closed", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

async fn process_job(context: &WorkerContext, job: QueuedJob) {
    let QueuedJob {
        record,
        path,
        filename,
        mime_type,
        cleanup,
        completion,
    } = job;
    let job_id = record.id.clone();

    let tracker = Arc::new(JobTracker::new(
        record,
        context.store.clone(),
        context.broadcaster.clone(),
    ));
    tracker.start();

    let pipeline_ctx = PipelineContext::new(job_id.as_str(), filename, path.clone(), mime_type);
    let result = context.pipeline.run(&pipeline_ctx, tracker.clone()).await;

    let record = match result {
        Ok(invoice) => tracker.complete(invoice),
        Err(e) => {
            warn!("Job {} failed: {}", job_id, e);
            tracker.fail(e.to_string())
        }
    };

    if let (Some(sink), Some(invoice)) = (context.sink.as_ref(), record.result.as_ref()) {
        if let Err(e) = sink.persist(invoice).await {
            error!("Failed to persist invoice for job {}: {}", job_id, e);
        }
    }

    remove_job_file(&job_id, &path, cleanup).await;

    if let Some(completion) = completion {
        let outcome = match record.result {
            Some(invoice) => Ok(invoice),
            None => Err(record.error.unwrap_or_default()),
        };
        if completion.send(outcome).is_err() {
            debug!("Nobody is waiting on job {} any more", job_id);
        }
    }
}

async fn remove_job_file(job_id: &str, path: &std::path::Path, cleanup: Cleanup) {
    let removed = match cleanup {
        Cleanup::Keep => return,
        Cleanup::Remove => tokio::fs::remove_file(path).await,
        Cleanup::Temporary(temp) => temp.close(),
    };
    if let Err(e) = removed {
        warn!(
            "Failed to remove file {} of job {}: {}",
            sanitize::redact_path(path),
            job_id,
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueSettings, Settings};
    use crate::error::OcrError;
    use crate::ocr::{OcrClient, OcrDocument};
    use crate::pipeline::{LogNotifier, Orchestrator};
    use crate::worker::job::{FileInfo, JobState, SourceKind};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    struct EchoClient;

    #[async_trait]
    impl OcrClient for EchoClient {
        async fn extract(&self, _endpoint: &str, document: OcrDocument) -> Result<Value, OcrError> {
            Ok(json!({
                "output": { "supplier_name": { "value": document.filename, "confidence": 0.9 } }
            }))
        }
    }

    fn context() -> Arc<WorkerContext> {
        let settings = Settings::new("https://ocr.example.com/hook");
        let orchestrator = Orchestrator::new(Arc::new(EchoClient), &settings, Arc::new(LogNotifier));
        Arc::new(WorkerContext {
            pipeline: Pipeline::new(orchestrator).with_heartbeat(5, Duration::from_millis(20)),
            store: StatusStore::new(&QueueSettings::default()),
            broadcaster: JobProgressBroadcaster::default(),
            sink: None,
        })
    }

    fn queued_job(
        dir: &TempDir,
        name: &str,
        cleanup: Cleanup,
    ) -> (QueuedJob, oneshot::Receiver<JobOutcome>) {
        let path = dir.path().join(name);
        std::fs::write(&path, b"data").unwrap();
        let record = JobRecord::queued(
            name,
            FileInfo {
                filename: name.to_string(),
                size: Some(4),
                mime_type: "application/pdf".to_string(),
                source: SourceKind::File,
            },
        );
        let (tx, rx) = oneshot::channel();
        (
            QueuedJob {
                record,
                path,
                filename: name.to_string(),
                mime_type: "application/pdf".to_string(),
                cleanup,
                completion: Some(tx),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        let context = context();
        let pool = WorkerPool::new(Arc::clone(&context), 2);

        let (job, rx) = queued_job(&dir, "a.pdf", Cleanup::Keep);
        pool.submit(job).unwrap();

        let invoice = rx.await.unwrap().unwrap();
        assert_eq!(invoice.ocr_data.field_value("supplier_name"), Some(&json!("a.pdf")));

        let record = context.store.get_status("a.pdf");
        assert_eq!(record.status, JobState::Completed);
        assert_eq!(record.progress, 100);
        assert!(dir.path().join("a.pdf").exists());

        pool.shutdown().await;
        assert!(pool.is_shutdown());
    }

    #[tokio::test]
    async fn test_uploaded_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(context(), 1);

        let (job, rx) = queued_job(&dir, "upload.pdf", Cleanup::Remove);
        pool.submit(job).unwrap();
        rx.await.unwrap().unwrap();

        assert!(!dir.path().join("upload.pdf").exists());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(context(), 1);
        pool.shutdown().await;

        let (job, _rx) = queued_job(&dir, "late.pdf", Cleanup::Keep);
        assert!(matches!(pool.submit(job), Err(JobError::PoolClosed)));
    }
}
