use thiserror::Error;

use crate::error::OcrError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("OCR failed after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: OcrError,
    },
}
