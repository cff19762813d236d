//! Creative document provider (Mistral vision chat completions).

use serde_json::Value;
use tracing::{debug, info, warn};

use super::normalizer::normalize;
use super::parser::parse_freeform_model_output;
use super::{log_preview, CanonicalOcrResult, Envelope, FieldValue, ImageRef, OcrAdapter, Provider};
use crate::chat::{first_choice_content, ChatCompletionRequest, Message};
use crate::error::{OcrError, CREATIVE_PROVIDER_FAILED};

pub const DEFAULT_CREATIVE_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_CREATIVE_MODEL: &str = "pixtral-12b-2409";

/// Type assumed when the model does not classify the document.
const DEFAULT_DOCUMENT_TYPE: &str = "recipe";

/// Content used when the response carries no message content.
const EMPTY_CONTENT: &str = "{}";

const EXTRACTION_PROMPT: &str = "You are an expert OCR engine. Analyze this image. \
Return ONLY a valid JSON object with the keys: \
{ \"title\", \"prepTime\", \"ingredients\" (array), \"instructions\", \"documentType\" }. \
No prose, no markdown, no code fences.";

pub struct CreativeDocAdapter {
    api_key: String,
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl CreativeDocAdapter {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_CREATIVE_URL.to_string(),
            model: DEFAULT_CREATIVE_MODEL.to_string(),
            client,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait::async_trait]
impl OcrAdapter for CreativeDocAdapter {
    fn provider(&self) -> Provider {
        Provider::Creative
    }

    async fn process(&self, image: &ImageRef) -> Result<CanonicalOcrResult, OcrError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user_with_image(EXTRACTION_PROMPT, image)],
        };

        info!(
            "CreativeDocAdapter: calling chat completions (model={}) for {}",
            self.model,
            image.describe()
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("CreativeDocAdapter: request failed: {}", e);
                OcrError::from_transport(&e, CREATIVE_PROVIDER_FAILED)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(
                "CreativeDocAdapter: API error ({}): {}",
                status,
                log_preview(&text)
            );
            return Err(OcrError::upstream(CREATIVE_PROVIDER_FAILED));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| OcrError::from_transport(&e, CREATIVE_PROVIDER_FAILED))?;
        debug!(
            "CreativeDocAdapter: raw response ({} bytes): {}",
            body.len(),
            log_preview(&body)
        );

        let raw: Value = serde_json::from_str(&body).map_err(|e| {
            warn!("CreativeDocAdapter: response is not JSON: {}", e);
            OcrError::upstream(CREATIVE_PROVIDER_FAILED)
        })?;

        let content = first_choice_content(&raw)
            .filter(|c| !c.is_empty())
            .unwrap_or(EMPTY_CONTENT)
            .to_string();

        let parsed = parse_freeform_model_output(&content);
        let doc_type = parsed
            .get("documentType")
            .and_then(FieldValue::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_DOCUMENT_TYPE)
            .to_string();

        Ok(normalize(Envelope {
            provider: Provider::Creative,
            doc_type: Some(doc_type),
            data: Some(parsed),
            raw_text: Some(content),
        }))
    }
}
