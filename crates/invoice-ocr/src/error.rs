use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum OcrEngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable '{name}' is not set")]
    MissingVar { name: &'static str },

    #[error("Invalid URL in '{name}': {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("Invalid value '{value}' for '{name}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to resolve OCR credential: {0}")]
    Secret(#[from] SecretError),
}

/// Failure of a single call against an OCR endpoint.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },

    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("OCR endpoint {endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("OCR endpoint {endpoint} returned an unreadable body: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} failed: {message}")]
    Processing { job_id: String, message: String },

    #[error("Failed to write temporary file for job {job_id}: {source}")]
    Materialize {
        job_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read submitted file '{path}': {source}")]
    InvalidSubmission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool is shut down")]
    PoolClosed,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to persist invoice for job {job_id}: {message}")]
    Persist { job_id: String, message: String },

    #[error("Failed to fetch invoice for job {job_id}: {message}")]
    Fetch { job_id: String, message: String },
}

pub type Result<T> = std::result::Result<T, OcrEngineError>;
