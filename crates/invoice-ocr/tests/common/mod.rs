//! Shared test utilities for invoice-ocr integration tests.
//!
//! This module provides:
//! - `TestHarness` running an `OcrEngine` against a scripted OCR client
//! - Builders for OCR payloads and settings

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{RecordingNotifier, ScriptedOcrClient, TestHarness};
