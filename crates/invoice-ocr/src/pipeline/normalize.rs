//! Reconciliation of heterogeneous OCR webhook responses into one shape.
//!
//! The webhook sometimes answers with a single object carrying `output`,
//! sometimes with an array of partial objects (one per extraction node).
//! Whatever arrives, the result always has an `output` object holding the
//! four invoice header fields and an `items` array.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

pub const REQUIRED_FIELDS: [&str; 4] = [
    "reference_number",
    "supplier_name",
    "invoice_date",
    "due_date",
];

const OUTPUT_KEY: &str = "output";
const ITEMS_KEY: &str = "items";
const UNKNOWN_SUPPLIER: &str = "Unknown Supplier";

/// Array element whose `output.items` seeds the line items of a synthesized base.
const ITEMS_SOURCE_INDEX: usize = 2;

/// OCR payload with a guaranteed `output` structure.
///
/// Serializes as the base object with `output` merged back in. Deserializing
/// runs the value through [`normalize`], so the guarantee survives a round
/// trip through storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPayload {
    output: Map<String, Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl NormalizedPayload {
    pub fn output(&self) -> &Map<String, Value> {
        &self.output
    }

    /// One of the required header fields (`{value, confidence}`).
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.output.get(name)
    }

    /// Value part of a header field, if it is a `{value, confidence}` pair.
    pub fn field_value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(|f| f.get("value"))
    }

    pub fn items(&self) -> &[Value] {
        self.output
            .get(ITEMS_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fields of the base object other than `output`.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.rest
    }

    pub fn into_value(self) -> Value {
        let mut base = self.rest;
        base.insert(OUTPUT_KEY.to_string(), Value::Object(self.output));
        Value::Object(base)
    }
}

impl<'de> Deserialize<'de> for NormalizedPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(normalize)
    }
}

/// Which defaulting pass produced a placeholder.
///
/// The passes disagree on confidence: fields synthesized from an array
/// without any `output` element are unconfident, while the final backfill
/// marks reference number and dates as confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaceholderPass {
    Synthesis,
    Backfill,
}

fn placeholder(field: &str, pass: PlaceholderPass) -> Value {
    let now = Utc::now();
    let backfill = pass == PlaceholderPass::Backfill;
    match field {
        "reference_number" => json!({
            "value": format!("INV-{}", now.timestamp_millis()),
            "confidence": backfill,
        }),
        "supplier_name" => json!({ "value": UNKNOWN_SUPPLIER, "confidence": false }),
        _ => json!({
            "value": now.format("%Y-%m-%d").to_string(),
            "confidence": backfill,
        }),
    }
}

/// Normalizes a raw webhook payload. Idempotent.
pub fn normalize(raw: Value) -> NormalizedPayload {
    let base = match raw {
        Value::Array(elements) => select_or_synthesize(elements),
        other => other,
    };

    let mut base = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut output = match base.remove(OUTPUT_KEY) {
        Some(Value::Object(output)) => output,
        _ => wrap_base(&base),
    };

    for field in REQUIRED_FIELDS {
        if output.get(field).map_or(true, Value::is_null) {
            output.insert(
                field.to_string(),
                placeholder(field, PlaceholderPass::Backfill),
            );
        }
    }

    if !output.get(ITEMS_KEY).is_some_and(Value::is_array) {
        output.insert(ITEMS_KEY.to_string(), Value::Array(Vec::new()));
    }

    NormalizedPayload { output, rest: base }
}

/// Picks the first element exposing `output`, or builds a base from all of them.
fn select_or_synthesize(mut elements: Vec<Value>) -> Value {
    if let Some(index) = elements
        .iter()
        .position(|e| e.get(OUTPUT_KEY).is_some_and(|o| !o.is_null()))
    {
        return elements.swap_remove(index);
    }

    let mut output = Map::new();
    for field in REQUIRED_FIELDS {
        let found = elements.iter().find_map(|element| lookup_field(element, field));
        let value = match found {
            Some(value) => value.clone(),
            None => placeholder(field, PlaceholderPass::Synthesis),
        };
        output.insert(field.to_string(), value);
    }

    let items = elements
        .get(ITEMS_SOURCE_INDEX)
        .and_then(|e| e.get(OUTPUT_KEY))
        .and_then(|o| o.get(ITEMS_KEY))
        .filter(|items| items.is_array())
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    output.insert(ITEMS_KEY.to_string(), items);

    let mut base = Map::new();
    base.insert(OUTPUT_KEY.to_string(), Value::Object(output));
    Value::Object(base)
}

/// A field defined on the element itself, else on its nested `output`.
fn lookup_field<'a>(element: &'a Value, field: &str) -> Option<&'a Value> {
    element
        .get(field)
        .filter(|v| !v.is_null())
        .or_else(|| {
            element
                .get(OUTPUT_KEY)
                .and_then(|o| o.get(field))
                .filter(|v| !v.is_null())
        })
}

/// Builds `output` from a shallow copy of a base that had none.
fn wrap_base(base: &Map<String, Value>) -> Map<String, Value> {
    let mut output = base.clone();
    if !output.get(ITEMS_KEY).is_some_and(Value::is_array) {
        output.insert(ITEMS_KEY.to_string(), Value::Array(Vec::new()));
    }
    output
}
