pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod telemetry;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent, StatusStore};
pub use config::{load_settings, load_settings_from, Settings};
pub use engine::{OcrEngine, OcrEngineBuilder, BUFFER_EXPIRED};
pub use error::{ConfigError, JobError, OcrEngineError, OcrError, Result, StorageError};
pub use ocr::{HttpOcrClient, OcrClient, OcrDocument};
pub use pipeline::{
    normalize, FailureNotice, FailureNotifier, InvoiceResult, NormalizedPayload, PayloadSource,
    PipelineError,
};
pub use secrets::{resolve_secret_optional, SecretError};
pub use storage::{InvoiceSink, MemoryInvoiceSink};
pub use worker::{BufferSubmission, FileInfo, FileSubmission, JobRecord, JobState, SourceKind};
