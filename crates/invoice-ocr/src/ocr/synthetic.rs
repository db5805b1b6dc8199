//! Fixed example payload substituted when every OCR endpoint failed and the
//! configuration permits synthetic data.

use serde_json::{json, Value};

pub const SYNTHETIC_SUPPLIER: &str = "Mock Supplier GmbH";
pub const SYNTHETIC_REFERENCE: &str = "MOCK-INV-0001";

/// Builds the synthetic OCR payload for `filename`.
///
/// The shape matches a well-formed single-object webhook response, so it
/// passes through normalization unchanged.
pub fn synthetic_payload(filename: &str) -> Value {
    let today = chrono::Utc::now().date_naive();
    let due = today + chrono::Days::new(30);

    json!({
        "synthetic": true,
        "source_filename": filename,
        "output": {
            "reference_number": { "value": SYNTHETIC_REFERENCE, "confidence": 0.99 },
            "supplier_name": { "value": SYNTHETIC_SUPPLIER, "confidence": 0.99 },
            "invoice_date": { "value": today.format("%Y-%m-%d").to_string(), "confidence": 0.95 },
            "due_date": { "value": due.format("%Y-%m-%d").to_string(), "confidence": 0.95 },
            "items": [
                {
                    "description": { "value": "Consulting services", "confidence": 0.92 },
                    "quantity": { "value": 10, "confidence": 0.9 },
                    "unit_price": { "value": 120.0, "confidence": 0.9 },
                    "amount": { "value": 1200.0, "confidence": 0.93 }
                },
                {
                    "description": { "value": "Travel expenses", "confidence": 0.88 },
                    "quantity": { "value": 1, "confidence": 0.9 },
                    "unit_price": { "value": 340.5, "confidence": 0.87 },
                    "amount": { "value": 340.5, "confidence": 0.9 }
                }
            ]
        }
    })
}
