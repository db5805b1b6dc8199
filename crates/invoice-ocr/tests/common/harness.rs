//! Test harness running an `OcrEngine` against a scripted OCR client.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use invoice_ocr::{
    FailureNotice, FailureNotifier, JobRecord, MemoryInvoiceSink, OcrClient, OcrDocument,
    OcrEngine, OcrError, Settings,
};

/// How long a test waits for a job to reach a terminal state or a file to vanish.
const TERMINAL_TIMEOUT: Duration = Duration::from_secs(10);

/// One scripted reply of the fake OCR webhook.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
}

/// OCR client answering from per-endpoint scripts.
///
/// Once an endpoint's script is exhausted every further call fails with a
/// transport error. Every call is recorded.
#[derive(Default)]
pub struct ScriptedOcrClient {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl ScriptedOcrClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always-failing client.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn reply(self, endpoint: &str, reply: Reply) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.entry(endpoint.to_string()).or_default().push(reply);
        }
        self
    }

    pub fn json(self, endpoint: &str, payload: Value) -> Self {
        self.reply(endpoint, Reply::Json(payload))
    }

    pub fn status(self, endpoint: &str, status: u16) -> Self {
        self.reply(endpoint, Reply::Status(status))
    }

    /// Sleeps before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(endpoint, filename)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|(e, _)| e == endpoint).count()
    }
}

#[async_trait]
impl OcrClient for ScriptedOcrClient {
    async fn extract(&self, endpoint: &str, document: OcrDocument) -> Result<Value, OcrError> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), document.filename.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .get_mut(endpoint)
                .filter(|script| !script.is_empty())
                .map(|script| script.remove(0))
        };

        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Status(status)) => Err(OcrError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: "scripted".to_string(),
            }),
            None => Err(OcrError::Transport {
                endpoint: endpoint.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

/// Collects failure notices.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<FailureNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<FailureNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl FailureNotifier for RecordingNotifier {
    fn notify(&self, notice: &FailureNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// Isolated engine with a temp directory for input documents.
pub struct TestHarness {
    temp_dir: TempDir,
    pub client: Arc<ScriptedOcrClient>,
    pub notifier: Arc<RecordingNotifier>,
    pub sink: Arc<MemoryInvoiceSink>,
    pub engine: OcrEngine,
}

impl TestHarness {
    /// Must be called from within a tokio runtime.
    pub fn new(settings: Settings, client: ScriptedOcrClient) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let client = Arc::new(client);
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = Arc::new(MemoryInvoiceSink::new());

        let engine = OcrEngine::builder(settings)
            .client(client.clone())
            .notifier(notifier.clone())
            .sink(sink.clone())
            .build()
            .expect("Failed to build engine");

        Self {
            temp_dir,
            client,
            notifier,
            sink,
            engine,
        }
    }

    /// Writes an input document and returns its path.
    pub fn write_document(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write document");
        path
    }

    /// Polls the status store until `job_id` is completed or failed.
    pub async fn wait_for_terminal(&self, job_id: &str) -> JobRecord {
        let poll = async {
            loop {
                let record = self.engine.status(job_id);
                if record.status.is_terminal() {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(TERMINAL_TIMEOUT, poll)
            .await
            .unwrap_or_else(|_| panic!("job {} did not finish in time", job_id))
    }

    /// Polls until `path` no longer exists.
    pub async fn wait_for_removal(&self, path: &Path) {
        let poll = async {
            while path.exists() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(TERMINAL_TIMEOUT, poll)
            .await
            .unwrap_or_else(|_| panic!("{} was not removed in time", path.display()))
    }
}
