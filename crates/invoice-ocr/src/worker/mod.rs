pub mod buffered;
pub mod job;
pub mod pool;
pub mod tracker;

pub use buffered::PendingBuffers;
pub use job::{BufferSubmission, FileInfo, FileSubmission, JobRecord, JobState, SourceKind};
pub use pool::{Cleanup, JobOutcome, QueuedJob, WorkerContext, WorkerPool};
pub use tracker::JobTracker;
