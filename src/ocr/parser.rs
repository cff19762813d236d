//! Extraction and repair of provider payloads.
//!
//! Both routines are total: absent paths and malformed model output degrade
//! to well-known values instead of errors.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

use super::{fields_from_object, FieldMap, FieldValue};

/// Title carried by [`parsing_fallback`]. Consumers detect degraded output by it.
pub const PARSING_ERROR_TITLE: &str = "parsing error";
/// Document type carried by [`parsing_fallback`].
pub const PARSING_ERROR_DOCUMENT_TYPE: &str = "other";

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json)?").expect("leading fence pattern compiles"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```$").expect("trailing fence pattern compiles"));

/// Value returned when model output cannot be read as a JSON object.
///
/// Always carries `title`, `ingredients`, `instructions` and `documentType`
/// so UI and storage code never branch on parse failure.
pub fn parsing_fallback() -> FieldMap {
    FieldMap::from([
        ("title".to_string(), FieldValue::from(PARSING_ERROR_TITLE)),
        ("ingredients".to_string(), FieldValue::List(Vec::new())),
        ("instructions".to_string(), FieldValue::from("")),
        (
            "documentType".to_string(),
            FieldValue::from(PARSING_ERROR_DOCUMENT_TYPE),
        ),
    ])
}

/// Walk `document.inference.prediction` and return it, or `{}` if any segment
/// is missing or not an object.
pub fn extract_structured_prediction(raw: &Value) -> FieldMap {
    match raw
        .get("document")
        .and_then(|d| d.get("inference"))
        .and_then(|i| i.get("prediction"))
    {
        Some(Value::Object(prediction)) => fields_from_object(prediction.clone()),
        _ => FieldMap::new(),
    }
}

/// Parse model output expected to hold a JSON object, optionally fenced as
/// a ```` ```json ```` block. Falls back to [`parsing_fallback`].
///
/// Only one leading and one trailing fence are removed; backticks inside
/// string values are left alone.
pub fn parse_freeform_model_output(text: &str) -> FieldMap {
    let body = strip_code_fence(text);

    if body.is_empty() {
        warn!("Model output is empty, using parsing fallback");
        return parsing_fallback();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => fields_from_object(map),
        Ok(other) => {
            warn!(
                "Model output is JSON but not an object ({}), using parsing fallback",
                json_kind(&other)
            );
            parsing_fallback()
        }
        Err(e) => {
            warn!("Model output is not valid JSON ({}), using parsing fallback", e);
            parsing_fallback()
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let start = LEADING_FENCE.find(trimmed).map_or(0, |m| m.end());
    let rest = &trimmed[start..];
    let end = TRAILING_FENCE.find(rest).map_or(rest.len(), |m| m.start());
    rest[..end].trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
