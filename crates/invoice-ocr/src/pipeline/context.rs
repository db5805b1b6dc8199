use std::path::PathBuf;

/// The document a single pipeline run operates on.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub job_id: String,
    /// Display filename, as submitted by the caller.
    pub filename: String,
    /// Readable file on disk. Re-read on every OCR attempt.
    pub path: PathBuf,
    pub mime_type: String,
}

impl PipelineContext {
    pub fn new(
        job_id: impl Into<String>,
        filename: impl Into<String>,
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            filename: filename.into(),
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }
}
