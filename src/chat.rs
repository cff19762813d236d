//! Chat-completion wire types for vision-capable models.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use serde_json::Value;

use crate::ocr::{mime_for_filename, ImageRef};

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl Message {
    /// User message with an instruction and one image.
    ///
    /// Remote references are passed through; uploaded bytes are inlined as a
    /// base64 `data:` URL.
    pub fn user_with_image(text: impl Into<String>, image: &ImageRef) -> Self {
        let url = match image {
            ImageRef::Url(url) => url.clone(),
            ImageRef::Bytes { filename, data } => data_url(filename, data),
        };

        Self {
            role: Role::User,
            content: vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ],
        }
    }
}

fn data_url(filename: &str, data: &[u8]) -> String {
    let mime = match mime_for_filename(filename) {
        "application/octet-stream" => "image/png",
        known => known,
    };
    format!("data:{};base64,{}", mime, BASE64.encode(data))
}

// ============================================================================
// Response walking
// ============================================================================

/// `choices[0].message.content` when it is a string.
pub fn first_choice_content(response: &Value) -> Option<&str> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}
