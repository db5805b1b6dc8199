//! Retry and fallback policy around the OCR client.

use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use crate::config::Settings;
use crate::error::OcrError;
use crate::ocr::{synthetic_payload, OcrClient, OcrDocument};
use crate::sanitize::redact_url;

use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ProgressReporter, PROGRESS_CAP};
use super::result::PayloadSource;

/// First progress value reported once OCR starts.
const PROGRESS_FLOOR: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AttemptOutcome {
    Success,
    Failure { error: String },
}

/// One OCR call made during an orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttempt {
    /// 1-based position within the run.
    pub index: u32,
    pub endpoint: EndpointKind,
    /// Endpoint URL, redacted.
    pub url: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl RetryAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

#[derive(Debug)]
pub struct OrchestrationOutcome {
    pub payload: Value,
    pub source: PayloadSource,
    pub attempts: Vec<RetryAttempt>,
}

/// Emitted whenever an orchestration run hits a terminal failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub job_id: String,
    pub filename: String,
    pub error: String,
    pub attempts: u32,
}

/// Observability hook for terminal OCR failures. Never affects control flow.
pub trait FailureNotifier: Send + Sync {
    fn notify(&self, notice: &FailureNotice);
}

/// Writes failure notices to the log.
pub struct LogNotifier;

impl FailureNotifier for LogNotifier {
    fn notify(&self, notice: &FailureNotice) {
        error!(
            "OCR failure for job {} ({}) after {} attempt(s): {}",
            notice.job_id, notice.filename, notice.attempts, notice.error
        );
    }
}

/// Drives one document through primary retries, fallback, and terminal policy.
pub struct Orchestrator {
    client: Arc<dyn OcrClient>,
    primary: String,
    fallback: Option<String>,
    max_retries: u32,
    allow_synthetic: bool,
    notifier: Arc<dyn FailureNotifier>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn OcrClient>,
        settings: &Settings,
        notifier: Arc<dyn FailureNotifier>,
    ) -> Self {
        Self {
            client,
            primary: settings.ocr.primary_url.clone(),
            fallback: settings.ocr.distinct_fallback().map(str::to_string),
            max_retries: settings.ocr.max_retries,
            allow_synthetic: settings.allows_synthetic_data(),
            notifier,
        }
    }

    /// Total number of calls a fully failing run makes.
    pub fn planned_attempts(&self) -> u32 {
        self.max_retries
            .saturating_add(1)
            .saturating_add(u32::from(self.fallback.is_some()))
    }

    pub async fn run(
        &self,
        ctx: &PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<OrchestrationOutcome, PipelineError> {
        let mut attempts = Vec::new();

        let mut last_error = match self
            .try_endpoint(ctx, EndpointKind::Primary, &self.primary, &mut attempts, progress)
            .await
        {
            Ok(payload) => return Ok(self.outcome(payload, PayloadSource::Primary, attempts)),
            Err(e) => e,
        };

        for _ in 0..self.max_retries {
            match self
                .try_endpoint(ctx, EndpointKind::Primary, &self.primary, &mut attempts, progress)
                .await
            {
                Ok(payload) => return Ok(self.outcome(payload, PayloadSource::Primary, attempts)),
                Err(e) => last_error = e,
            }
        }

        self.notify(ctx, &last_error, &attempts);

        if let Some(ref fallback) = self.fallback {
            info!(
                "Primary OCR endpoint exhausted for job {}, trying fallback",
                ctx.job_id
            );
            match self
                .try_endpoint(ctx, EndpointKind::Fallback, fallback, &mut attempts, progress)
                .await
            {
                Ok(payload) => return Ok(self.outcome(payload, PayloadSource::Fallback, attempts)),
                Err(e) => {
                    last_error = e;
                    self.notify(ctx, &last_error, &attempts);
                }
            }
        }

        if self.allow_synthetic {
            warn!(
                "All OCR endpoints failed for job {}, substituting synthetic data: {}",
                ctx.job_id, last_error
            );
            let payload = synthetic_payload(&ctx.filename);
            return Ok(self.outcome(payload, PayloadSource::Synthetic, attempts));
        }

        Err(PipelineError::Exhausted {
            attempts: attempts.len() as u32,
            source: last_error,
        })
    }

    async fn try_endpoint(
        &self,
        ctx: &PipelineContext,
        kind: EndpointKind,
        endpoint: &str,
        attempts: &mut Vec<RetryAttempt>,
        progress: &dyn ProgressReporter,
    ) -> Result<Value, OcrError> {
        let index = attempts.len() as u32 + 1;
        progress.report(
            self.attempt_progress(index),
            &format!("OCR attempt {} of {}", index, self.planned_attempts()),
        );

        let span = tracing::info_span!("ocr.attempt", job_id = %ctx.job_id, attempt = index);
        let result = async {
            // A consumed upload cannot be replayed, so every attempt reads the file again.
            let bytes = tokio::fs::read(&ctx.path)
                .await
                .map_err(|e| OcrError::ReadDocument {
                    path: ctx.path.clone(),
                    source: e,
                })?;
            let document = OcrDocument {
                filename: ctx.filename.clone(),
                mime_type: ctx.mime_type.clone(),
                bytes,
            };
            self.client.extract(endpoint, document).await
        }
        .instrument(span)
        .await;

        let outcome = match result {
            Ok(_) => AttemptOutcome::Success,
            Err(ref e) => {
                warn!(
                    "OCR attempt {} for job {} against {} failed: {}",
                    index,
                    ctx.job_id,
                    redact_url(endpoint),
                    e
                );
                AttemptOutcome::Failure {
                    error: e.to_string(),
                }
            }
        };
        attempts.push(RetryAttempt {
            index,
            endpoint: kind,
            url: redact_url(endpoint),
            outcome,
        });

        result
    }

    /// Maps attempt `index` (1-based) into `PROGRESS_FLOOR..=PROGRESS_CAP`.
    fn attempt_progress(&self, index: u32) -> u8 {
        let span = u64::from(PROGRESS_CAP - PROGRESS_FLOOR);
        let step = span * u64::from(index.saturating_sub(1)) / u64::from(self.planned_attempts());
        (u64::from(PROGRESS_FLOOR) + step).min(u64::from(PROGRESS_CAP)) as u8
    }

    fn outcome(
        &self,
        payload: Value,
        source: PayloadSource,
        attempts: Vec<RetryAttempt>,
    ) -> OrchestrationOutcome {
        OrchestrationOutcome {
            payload,
            source,
            attempts,
        }
    }

    fn notify(&self, ctx: &PipelineContext, error: &OcrError, attempts: &[RetryAttempt]) {
        self.notifier.notify(&FailureNotice {
            job_id: ctx.job_id.clone(),
            filename: ctx.filename.clone(),
            error: error.to_string(),
            attempts: attempts.len() as u32,
        });
    }
}
