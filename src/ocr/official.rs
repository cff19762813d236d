//! Official document provider (Mindee invoice prediction API).

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::normalizer::normalize;
use super::parser::extract_structured_prediction;
use super::{
    log_preview, mime_for_filename, CanonicalOcrResult, Envelope, FieldMap, FieldValue,
    ImageRef, OcrAdapter, Provider,
};
use crate::error::{OcrError, OFFICIAL_PROVIDER_FAILED};

pub const DEFAULT_OFFICIAL_URL: &str =
    "https://api.mindee.net/v1/products/mindee/invoices/v4/prediction";

/// Every result from this provider is tagged as an invoice.
// TODO: classify identity documents once a second Mindee product is wired in.
const OFFICIAL_DOCUMENT_TYPE: &str = "invoice";

pub struct OfficialDocAdapter {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OfficialDocAdapter {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_OFFICIAL_URL.to_string(),
            client,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_form(image: &ImageRef) -> Result<Form, OcrError> {
        let form = match image {
            ImageRef::Url(url) => Form::new().text("document", url.clone()),
            ImageRef::Bytes { filename, data } => {
                let part = Part::bytes(data.clone())
                    .file_name(filename.clone())
                    .mime_str(mime_for_filename(filename))
                    .map_err(|_| OcrError::upstream(OFFICIAL_PROVIDER_FAILED))?;
                Form::new().part("document", part)
            }
        };
        Ok(form)
    }
}

#[async_trait::async_trait]
impl OcrAdapter for OfficialDocAdapter {
    fn provider(&self) -> Provider {
        Provider::Official
    }

    async fn process(&self, image: &ImageRef) -> Result<CanonicalOcrResult, OcrError> {
        let form = Self::build_form(image)?;

        info!("OfficialDocAdapter: calling prediction API for {}", image.describe());

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Token {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("OfficialDocAdapter: request failed: {}", e);
                OcrError::from_transport(&e, OFFICIAL_PROVIDER_FAILED)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(
                "OfficialDocAdapter: API error ({}): {}",
                status,
                log_preview(&text)
            );
            return Err(OcrError::upstream(OFFICIAL_PROVIDER_FAILED));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| OcrError::from_transport(&e, OFFICIAL_PROVIDER_FAILED))?;
        debug!(
            "OfficialDocAdapter: raw response ({} bytes): {}",
            body.len(),
            log_preview(&body)
        );

        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            warn!("OfficialDocAdapter: response is not JSON: {}", e);
            OcrError::upstream(OFFICIAL_PROVIDER_FAILED)
        })?;

        let prediction = extract_structured_prediction(&raw);
        let raw_text = locale_text(&prediction);

        Ok(normalize(Envelope {
            provider: Provider::Official,
            doc_type: Some(OFFICIAL_DOCUMENT_TYPE.to_string()),
            data: Some(prediction),
            raw_text: Some(raw_text),
        }))
    }
}

/// Text taken from the prediction's `locale` field: either a bare string or
/// the `value` of a `{ value, ... }` object. Empty when absent.
fn locale_text(prediction: &FieldMap) -> String {
    match prediction.get("locale") {
        Some(FieldValue::Text(text)) => text.clone(),
        Some(FieldValue::Map(locale)) => locale
            .get("value")
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
