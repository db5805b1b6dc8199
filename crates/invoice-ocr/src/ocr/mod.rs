//! Access to the external OCR webhook.

pub mod client;
pub mod synthetic;

pub use client::{HttpOcrClient, OcrClient, OcrDocument};
pub use synthetic::synthetic_payload;
