use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::info;
use tracing::{info_span, Instrument};

use crate::sanitize;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::normalize::normalize;
use super::orchestrator::Orchestrator;
use super::progress::{Heartbeat, ProgressReporter, PROGRESS_CAP};
use super::result::InvoiceResult;

/// Runs one document through OCR orchestration and normalization.
pub struct Pipeline {
    orchestrator: Orchestrator,
    heartbeat: Option<(u8, Duration)>,
}

impl Pipeline {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            heartbeat: None,
        }
    }

    /// Steps progress by `step` every `interval` while OCR is in flight.
    pub fn with_heartbeat(mut self, step: u8, interval: Duration) -> Self {
        self.heartbeat = Some((step, interval));
        self
    }

    /// Run the full pipeline for a single document.
    pub async fn run(
        &self,
        ctx: &PipelineContext,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<InvoiceResult, PipelineError> {
        let span = info_span!("pipeline",
            job_id = %ctx.job_id,
            file = %sanitize::redact_path(&ctx.path),
        );
        self.run_steps(ctx, progress).instrument(span).await
    }

    async fn run_steps(
        &self,
        ctx: &PipelineContext,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<InvoiceResult, PipelineError> {
        // Step 1: OCR with retries and fallback. The heartbeat stops with it.
        let outcome = {
            let _heartbeat = self
                .heartbeat
                .map(|(step, interval)| Heartbeat::start(progress.clone(), step, interval));
            self.orchestrator
                .run(ctx, progress.as_ref())
                .instrument(info_span!("orchestrate"))
                .await?
        };

        // Step 2: Normalize into the canonical shape
        let ocr_data = {
            let _step = info_span!("normalize").entered();
            progress.report(PROGRESS_CAP, "Normalizing OCR output...");
            normalize(outcome.payload)
        };

        let result = InvoiceResult {
            job_id: ctx.job_id.clone(),
            filename: ctx.filename.clone(),
            processed_at: Utc::now(),
            source: outcome.source,
            attempts: outcome.attempts.len() as u32,
            ocr_data,
        };

        info!(
            "Job {} processed from {} with {} item(s)",
            result.job_id,
            result.source,
            result.item_count()
        );
        Ok(result)
    }
}
