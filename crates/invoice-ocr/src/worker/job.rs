use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::InvoiceResult;

/// Media type used when neither the caller nor the filename tells us one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
    NotFound,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Error => write!(f, "error"),
            JobState::NotFound => write!(f, "not_found"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Buffer,
}

/// Metadata about the submitted document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub filename: String,
    pub size: Option<u64>,
    pub mime_type: String,
    pub source: SourceKind,
}

/// Full status record of one job, as kept in the status store.
///
/// Records are only built through the state constructors below, which keep
/// `result` and `error` consistent with `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub status: JobState,
    pub result: Option<InvoiceResult>,
    pub error: Option<String>,
    pub progress: u8,
    pub file_info: Option<FileInfo>,
    pub queued_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(id: &str, file_info: FileInfo) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status: JobState::Queued,
            result: None,
            error: None,
            progress: 0,
            file_info: Some(file_info),
            queued_at: Some(now),
            updated_at: now,
        }
    }

    /// Placeholder returned for ids the store does not know.
    pub fn not_found(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobState::NotFound,
            result: None,
            error: None,
            progress: 0,
            file_info: None,
            queued_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn processing(&self, progress: u8) -> Self {
        self.transition(JobState::Processing, progress, None, None)
    }

    pub fn completed(&self, result: InvoiceResult) -> Self {
        self.transition(JobState::Completed, 100, Some(result), None)
    }

    /// Error records always carry progress 0.
    pub fn failed(&self, error: impl Into<String>) -> Self {
        self.transition(JobState::Error, 0, None, Some(error.into()))
    }

    fn transition(
        &self,
        status: JobState,
        progress: u8,
        result: Option<InvoiceResult>,
        error: Option<String>,
    ) -> Self {
        Self {
            id: self.id.clone(),
            status,
            result,
            error,
            progress,
            file_info: self.file_info.clone(),
            queued_at: self.queued_at,
            updated_at: Utc::now(),
        }
    }

    pub fn filename(&self) -> &str {
        self.file_info
            .as_ref()
            .map(|info| info.filename.as_str())
            .unwrap_or("unknown")
    }
}

/// A document already on disk.
#[derive(Debug, Clone)]
pub struct FileSubmission {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
    /// Remove `path` once the job reaches a terminal state.
    pub delete_after: bool,
}

impl FileSubmission {
    /// Filename and media type are derived from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let mime_type = detect_mime_type(&path);
        Self {
            path,
            filename,
            mime_type,
            delete_after: false,
        }
    }

    /// Overrides the display filename. The media type is re-detected from it.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self.mime_type = detect_mime_type(Path::new(&self.filename));
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Treat the file as an upload owned by the job.
    pub fn delete_after_processing(mut self) -> Self {
        self.delete_after = true;
        self
    }
}

/// An in-memory document held until its job is triggered.
#[derive(Debug, Clone)]
pub struct BufferSubmission {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl BufferSubmission {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let mime_type = detect_mime_type(Path::new(&filename));
        Self {
            bytes: bytes.into(),
            filename,
            mime_type,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            filename: self.filename.clone(),
            size: Some(self.bytes.len() as u64),
            mime_type: self.mime_type.clone(),
            source: SourceKind::Buffer,
        }
    }
}

pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Detects the media type from a path using the mime_guess crate.
pub fn detect_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
