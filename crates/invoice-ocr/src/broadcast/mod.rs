//! Job status tracking and real-time event streaming.

pub mod job_progress;
pub mod status_store;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
pub use status_store::StatusStore;
