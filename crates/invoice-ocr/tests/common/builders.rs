//! Builders for OCR payloads and engine settings.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};

use invoice_ocr::Settings;

pub const PRIMARY_URL: &str = "https://ocr.test/webhook/primary";
pub const FALLBACK_URL: &str = "https://ocr.test/webhook/fallback";

/// Settings pointing at the scripted endpoints with a fast heartbeat.
pub fn test_settings() -> Settings {
    let mut settings = Settings::new(PRIMARY_URL);
    settings.queue.heartbeat_interval = Duration::from_millis(10);
    settings.queue.worker_count = 2;
    settings
}

/// Builder for well-formed single-object webhook responses.
pub struct PayloadBuilder {
    fields: serde_json::Map<String, Value>,
    items: Vec<Value>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self {
            fields: serde_json::Map::new(),
            items: Vec::new(),
        }
    }

    /// A complete invoice with every required field set.
    pub fn invoice() -> Self {
        Self::new()
            .field("reference_number", "INV-2024-0042", 0.97)
            .field("supplier_name", "Acme Office Supplies", 0.95)
            .field("invoice_date", "2024-03-01", 0.9)
            .field("due_date", "2024-03-31", 0.9)
    }

    pub fn field(mut self, name: &str, value: &str, confidence: f64) -> Self {
        self.fields.insert(
            name.to_string(),
            json!({ "value": value, "confidence": confidence }),
        );
        self
    }

    pub fn item(mut self, description: &str, amount: f64) -> Self {
        self.items.push(json!({
            "description": { "value": description, "confidence": 0.9 },
            "amount": { "value": amount, "confidence": 0.9 }
        }));
        self
    }

    pub fn build(self) -> Value {
        let mut output = self.fields;
        output.insert("items".to_string(), Value::Array(self.items));
        json!({ "output": output })
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Array response where no element carries an `output` object.
pub fn fragmented_payload() -> Value {
    json!([
        { "supplier_name": { "value": "Fragment Supplier", "confidence": 0.8 } },
        { "output": null, "reference_number": { "value": "FR-1", "confidence": 0.7 } },
        { "invoice_date": { "value": "2024-05-05", "confidence": 0.6 } }
    ])
}
