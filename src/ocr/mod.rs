//! OCR provider abstraction.
//!
//! Defines the [`OcrAdapter`] trait and the canonical types every provider
//! converges to, so the dispatcher can route a document to either upstream
//! and hand back one shape to storage and UI code.

pub mod creative;
pub mod dispatcher;
pub mod normalizer;
pub mod official;
pub mod parser;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::OcrError;

/// Which upstream service produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Official,
    Creative,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Creative => "creative",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    /// Accepts the canonical names and the upstream vendor names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "official" | "mindee" => Ok(Self::Official),
            "creative" | "mistral" => Ok(Self::Creative),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Document classification shared by both providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Invoice,
    Identity,
    Recipe,
    #[default]
    Other,
}

impl DocumentType {
    /// Map a provider tag into the known set. Unrecognized tags are `Other`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "invoice" | "facture" => Self::Invoice,
            "identity" | "cni" | "id_card" => Self::Identity,
            "recipe" | "recette" => Self::Recipe,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Identity => "identity",
            Self::Recipe => "recipe",
            Self::Other => "other",
        }
    }
}

/// Loose, provider-agnostic field mapping.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<FieldValue>),
    Map(FieldMap),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(fields_from_object(map)),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Number(n) => Value::Number(n),
            FieldValue::Text(s) => Value::String(s),
            FieldValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FieldValue::Map(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Convert a decoded JSON object into a [`FieldMap`].
pub fn fields_from_object(map: serde_json::Map<String, Value>) -> FieldMap {
    map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect()
}

/// Convert any JSON value into a [`FieldMap`], if it is an object.
pub fn fields_from_json(value: Value) -> Option<FieldMap> {
    match value {
        Value::Object(map) => Some(fields_from_object(map)),
        _ => None,
    }
}

/// Intermediate adapter output, before normalization.
///
/// Optional fields model what a provider might fail to supply; the normalizer
/// coerces them so the canonical invariants hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub provider: Provider,
    pub doc_type: Option<String>,
    pub data: Option<FieldMap>,
    pub raw_text: Option<String>,
}

/// Converged OCR result handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOcrResult {
    pub provider: Provider,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    #[serde(rename = "data")]
    pub extracted_data: FieldMap,
    #[serde(rename = "rawText")]
    pub raw_text: String,
}

/// Input to an OCR adapter: either a remote reference or uploaded bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    Url(String),
    Bytes { filename: String, data: Vec<u8> },
}

impl ImageRef {
    /// Reference by URL. Surrounding whitespace is dropped.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Url(url) => url.trim().is_empty(),
            Self::Bytes { data, .. } => data.is_empty(),
        }
    }

    /// Short description for logs. Never includes payload bytes.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { filename, data } => format!("{} ({} bytes)", filename, data.len()),
        }
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::url(s)
    }
}

/// Async trait implemented by each upstream adapter.
#[async_trait::async_trait]
pub trait OcrAdapter: Send + Sync {
    fn provider(&self) -> Provider;
    async fn process(&self, image: &ImageRef) -> Result<CanonicalOcrResult, OcrError>;
}

/// Best-effort MIME type from a file name.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Prefix of `text` for debug logging, cut on a char boundary.
pub(crate) fn log_preview(text: &str) -> &str {
    let mut end = text.len().min(500);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
