pub mod context;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod result;
pub mod runner;

pub use context::PipelineContext;
pub use error::PipelineError;
pub use normalize::{normalize, NormalizedPayload, REQUIRED_FIELDS};
pub use orchestrator::{
    AttemptOutcome, EndpointKind, FailureNotice, FailureNotifier, LogNotifier,
    OrchestrationOutcome, Orchestrator, RetryAttempt,
};
pub use progress::{Heartbeat, NoopProgress, ProgressReporter, PROGRESS_CAP};
pub use result::{InvoiceResult, PayloadSource};
pub use runner::Pipeline;
