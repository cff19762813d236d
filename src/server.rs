//! HTTP surface: upload, OCR dispatch and record confirmation.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Locale;
use crate::error::{Notice, OcrError, StorageError};
use crate::ocr::dispatcher::OcrDispatcher;
use crate::ocr::{
    fields_from_json, mime_for_filename, CanonicalOcrResult, DocumentType, FieldMap, ImageRef,
    Provider,
};
use crate::records::{DocumentRecord, DocumentStore};
use crate::storage::FileStorage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<OcrDispatcher>,
    pub storage: FileStorage,
    pub documents: Arc<dyn DocumentStore>,
    pub locale: Locale,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload_file))
        .route("/uploads/:name", get(get_upload))
        .route("/ocr", post(process_ocr))
        .route("/documents", post(save_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, notice: Notice, locale: Locale) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: notice.text(locale).to_string(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest {
    image_url: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    pub data: CanonicalOcrResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveDocumentRequest {
    file_path: Option<String>,
    provider: Option<String>,
    doc_type: Option<String>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveDocumentResponse {
    pub success: bool,
    pub id: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// Store an uploaded image under a fresh `{uuid}.{ext}` name.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let locale = state.locale;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Multipart error: {}", e);
        api_error(StatusCode::BAD_REQUEST, Notice::MissingFile, locale)
    })? {
        if field.name() == Some("file") {
            let original = field.file_name().unwrap_or("document").to_string();
            let data = field.bytes().await.map_err(|e| {
                warn!("Failed to read upload: {}", e);
                api_error(StatusCode::BAD_REQUEST, Notice::MissingFile, locale)
            })?;
            upload = Some((original, data.to_vec()));
            break;
        }
    }

    let (original, data) = match upload {
        Some((original, data)) if !data.is_empty() => (original, data),
        _ => return Err(api_error(StatusCode::BAD_REQUEST, Notice::MissingFile, locale)),
    };

    let file_name = match upload_extension(&original) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };

    let url = state.storage.store(&file_name, &data).await.map_err(|e| {
        error!("Upload error: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, Notice::ServerError, locale)
    })?;

    info!("Stored upload {} as {} ({} bytes)", original, file_name, data.len());
    Ok(Json(UploadResponse {
        success: true,
        url,
        file_path: file_name,
    }))
}

async fn get_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let locale = state.locale;
    let bytes = state
        .storage
        .fetch(&name)
        .await
        .map_err(|e| read_error(e, &name, locale))?;

    Ok(([(header::CONTENT_TYPE, mime_for_filename(&name))], bytes).into_response())
}

/// Run OCR on an uploaded file or remote image.
async fn process_ocr(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let locale = state.locale;
    let image_url = request.image_url.map(|url| url.trim().to_string());
    let (image_url, category) = match (image_url, request.category) {
        (Some(url), Some(category)) if !url.is_empty() && !category.is_empty() => (url, category),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                Notice::MissingParameters,
                locale,
            ))
        }
    };

    let image = if FileStorage::is_local_reference(&image_url) {
        let data = state
            .storage
            .fetch(&image_url)
            .await
            .map_err(|e| read_error(e, &image_url, locale))?;
        ImageRef::Bytes {
            filename: FileStorage::name_from_reference(&image_url).to_string(),
            data,
        }
    } else {
        ImageRef::url(image_url)
    };

    let result = state
        .dispatcher
        .process(&category, image)
        .await
        .map_err(|e| {
            error!("OCR error: {}", e);
            let status = match e {
                OcrError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                OcrError::Upstream(_) => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(ErrorBody {
                    error: e.user_message(locale).to_string(),
                }),
            )
        })?;

    Ok(Json(OcrResponse {
        success: true,
        data: result,
    }))
}

/// Persist a user-confirmed (possibly edited) OCR result.
async fn save_document(
    State(state): State<AppState>,
    Json(request): Json<SaveDocumentRequest>,
) -> Result<Json<SaveDocumentResponse>, ApiError> {
    let locale = state.locale;
    let incomplete = || api_error(StatusCode::BAD_REQUEST, Notice::IncompleteData, locale);

    let file_path = request.file_path.filter(|s| !s.is_empty()).ok_or_else(incomplete)?;
    let provider: Provider = request
        .provider
        .as_deref()
        .ok_or_else(incomplete)?
        .parse()
        .map_err(|_| incomplete())?;
    let doc_type = request
        .doc_type
        .filter(|s| !s.is_empty())
        .map(|t| DocumentType::from_tag(&t))
        .ok_or_else(incomplete)?;
    let metadata = metadata_fields(request.metadata).ok_or_else(incomplete)?;
    let user_id = request
        .user_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let record = DocumentRecord::validated(
        user_id,
        file_path,
        provider,
        doc_type,
        metadata,
        request.full_text.unwrap_or_default(),
    );

    state.documents.insert(&record).await.map_err(|e| {
        error!("Save error: {:#}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, Notice::ServerError, locale)
    })?;

    info!("Saved document {} ({})", record.id, record.doc_type.as_str());
    Ok(Json(SaveDocumentResponse {
        success: true,
        id: record.id,
    }))
}

// ============================================================================
// Helper functions
// ============================================================================

fn read_error(err: StorageError, reference: &str, locale: Locale) -> ApiError {
    match err {
        StorageError::NotFound(_) | StorageError::InvalidName(_) => {
            api_error(StatusCode::NOT_FOUND, Notice::NotFound, locale)
        }
        StorageError::Io(e) => {
            error!("Read error for {}: {}", reference, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, Notice::ServerError, locale)
        }
    }
}

/// Extension kept from the client file name, if it is short and alphanumeric.
fn upload_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Metadata arrives as an object, or as a JSON string holding one (form posts).
fn metadata_fields(metadata: Value) -> Option<FieldMap> {
    match metadata {
        Value::Null => Some(FieldMap::new()),
        Value::String(s) if s.trim().is_empty() => Some(FieldMap::new()),
        Value::String(s) => serde_json::from_str(&s).ok().and_then(fields_from_json),
        other => fields_from_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CREATIVE_PROVIDER_FAILED;
    use crate::ocr::{FieldValue, OcrAdapter};
    use crate::records::MemoryDocumentStore;
    use crate::test_support::spawn;
    use serde_json::json;
    use std::sync::Mutex;

    /// Adapter double that records what it was asked to read.
    struct RecordingAdapter {
        provider: Provider,
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl OcrAdapter for RecordingAdapter {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn process(&self, image: &ImageRef) -> Result<CanonicalOcrResult, OcrError> {
            self.seen.lock().unwrap().push(image.describe());
            if self.fail {
                return Err(OcrError::upstream(CREATIVE_PROVIDER_FAILED));
            }
            Ok(CanonicalOcrResult {
                provider: self.provider,
                document_type: DocumentType::Invoice,
                extracted_data: FieldMap::from([("total".to_string(), FieldValue::from("9.99"))]),
                raw_text: String::new(),
            })
        }
    }

    struct Harness {
        base: String,
        client: reqwest::Client,
        official: Arc<RecordingAdapter>,
        documents: MemoryDocumentStore,
        _dir: tempfile::TempDir,
    }

    async fn harness(locale: Locale) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let official = Arc::new(RecordingAdapter {
            provider: Provider::Official,
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let creative = Arc::new(RecordingAdapter {
            provider: Provider::Creative,
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let documents = MemoryDocumentStore::new();
        let state = AppState {
            dispatcher: Arc::new(OcrDispatcher::new(official.clone(), creative)),
            storage: FileStorage::new(dir.path()),
            documents: Arc::new(documents.clone()),
            locale,
        };
        let base = spawn(router(state, 1024 * 1024)).await;
        Harness {
            base,
            client: reqwest::Client::new(),
            official,
            documents,
            _dir: dir,
        }
    }

    async fn upload(h: &Harness, name: &str, bytes: &[u8]) -> UploadResponse {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = h
            .client
            .post(format!("{}/upload", h.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(Locale::En).await;
        let body = h.client.get(format!("{}/health", h.base)).send().await.unwrap();
        assert_eq!(body.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let h = harness(Locale::En).await;
        let uploaded = upload(&h, "Receipt.PNG", b"png-bytes").await;

        assert!(uploaded.success);
        assert!(uploaded.file_path.ends_with(".png"));
        assert_eq!(uploaded.url, format!("/uploads/{}", uploaded.file_path));

        let resp = h
            .client
            .get(format!("{}{}", h.base, uploaded.url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "image/png");
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let h = harness(Locale::Fr).await;
        let form = reqwest::multipart::Form::new().text("note", "nothing here");
        let resp = h
            .client
            .post(format!("{}/upload", h.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.error, "Aucun fichier fourni");
    }

    #[tokio::test]
    async fn test_unknown_upload_is_not_found() {
        let h = harness(Locale::En).await;
        let resp = h
            .client
            .get(format!("{}/uploads/missing.png", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_ocr_on_uploaded_file_sends_bytes() {
        let h = harness(Locale::En).await;
        let uploaded = upload(&h, "scan.jpg", b"jpeg").await;

        let resp = h
            .client
            .post(format!("{}/ocr", h.base))
            .json(&json!({ "imageUrl": uploaded.url, "category": "official" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: OcrResponse = resp.json().await.unwrap();
        assert!(body.success);
        assert_eq!(body.data.provider, Provider::Official);

        let seen = h.official.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), [format!("{} (4 bytes)", uploaded.file_path)]);
    }

    #[tokio::test]
    async fn test_ocr_on_remote_url_forwards_reference() {
        let h = harness(Locale::En).await;
        let resp = h
            .client
            .post(format!("{}/ocr", h.base))
            .json(&json!({ "imageUrl": "https://cdn.example.com/a.png", "category": "official" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let seen = h.official.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["https://cdn.example.com/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_ocr_trims_image_reference() {
        let h = harness(Locale::En).await;
        let resp = h
            .client
            .post(format!("{}/ocr", h.base))
            .json(&json!({ "imageUrl": "  https://cdn.example.com/a.png \n", "category": "official" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = h
            .client
            .post(format!("{}/ocr", h.base))
            .json(&json!({ "imageUrl": "   ", "category": "official" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let seen = h.official.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["https://cdn.example.com/a.png".to_string()]);
    }

    #[tokio::test]
    async fn test_ocr_rejects_missing_and_unknown_parameters() {
        let h = harness(Locale::Fr).await;
        for payload in [
            json!({ "category": "official" }),
            json!({ "imageUrl": "https://x/a.png" }),
            json!({ "imageUrl": "https://x/a.png", "category": "poetry" }),
        ] {
            let resp = h
                .client
                .post(format!("{}/ocr", h.base))
                .json(&payload)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400, "{}", payload);
            let body: ErrorBody = resp.json().await.unwrap();
            assert_eq!(body.error, "Paramètres manquants");
        }
        assert!(h.official.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ocr_upstream_failure_is_generic_message() {
        let h = harness(Locale::En).await;
        let resp = h
            .client
            .post(format!("{}/ocr", h.base))
            .json(&json!({ "imageUrl": "https://x/a.png", "category": "creative" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 502);
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.error, "OCR failed");
    }

    #[tokio::test]
    async fn test_save_document_persists_validated_record() {
        let h = harness(Locale::En).await;
        let resp = h
            .client
            .post(format!("{}/documents", h.base))
            .json(&json!({
                "filePath": "abc.png",
                "provider": "mindee",
                "docType": "facture",
                "metadata": "{\"total\": {\"value\": 42}}",
                "fullText": "Total 42",
                "userId": "user-7"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: SaveDocumentResponse = resp.json().await.unwrap();

        let record = h.documents.get(&body.id).unwrap();
        assert_eq!(record.user_id, "user-7");
        assert_eq!(record.file_path, "abc.png");
        assert_eq!(record.provider, Provider::Official);
        assert_eq!(record.doc_type, DocumentType::Invoice);
        assert_eq!(record.full_text, "Total 42");
        assert_eq!(
            serde_json::to_value(&record.metadata).unwrap(),
            json!({ "total": { "value": 42 } })
        );
    }

    #[tokio::test]
    async fn test_save_document_rejects_incomplete_data() {
        let h = harness(Locale::En).await;
        for payload in [
            json!({ "provider": "official", "docType": "invoice" }),
            json!({ "filePath": "a.png", "docType": "invoice" }),
            json!({ "filePath": "a.png", "provider": "official" }),
            json!({ "filePath": "a.png", "provider": "ocrspace", "docType": "invoice" }),
            json!({ "filePath": "a.png", "provider": "official", "docType": "invoice", "metadata": "{oops" }),
        ] {
            let resp = h
                .client
                .post(format!("{}/documents", h.base))
                .json(&payload)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400, "{}", payload);
        }
        assert!(h.documents.is_empty());
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension("a.JPG"), Some("jpg".to_string()));
        assert_eq!(upload_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(upload_extension("noext"), None);
        assert_eq!(upload_extension("weird.p/ng"), None);
    }

    #[test]
    fn test_metadata_fields() {
        assert_eq!(metadata_fields(Value::Null), Some(FieldMap::new()));
        assert_eq!(metadata_fields(json!("")), Some(FieldMap::new()));
        assert!(metadata_fields(json!({ "a": 1 })).is_some());
        assert!(metadata_fields(json!("{\"a\": 1}")).is_some());
        assert!(metadata_fields(json!("[1]")).is_none());
        assert!(metadata_fields(json!(3)).is_none());
    }
}
