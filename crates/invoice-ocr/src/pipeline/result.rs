use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::NormalizedPayload;

/// Where the payload of a completed job came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Primary,
    Fallback,
    Synthetic,
}

impl std::fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadSource::Primary => write!(f, "primary endpoint"),
            PayloadSource::Fallback => write!(f, "fallback endpoint"),
            PayloadSource::Synthetic => write!(f, "synthetic data"),
        }
    }
}

/// Canonical result handed to callers for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResult {
    pub job_id: String,
    pub filename: String,
    pub processed_at: DateTime<Utc>,
    pub source: PayloadSource,
    /// Number of OCR calls made, including the successful one.
    pub attempts: u32,
    pub ocr_data: NormalizedPayload,
}

impl InvoiceResult {
    pub fn item_count(&self) -> usize {
        self.ocr_data.items().len()
    }
}
