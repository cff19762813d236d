//! Document OCR gateway - upload, OCR dispatch and record persistence server.

use doc_ocr_gateway::config::AppConfig;
use doc_ocr_gateway::ocr::dispatcher::OcrDispatcher;
use doc_ocr_gateway::records::{DocumentStore, MemoryDocumentStore, SupabaseDocumentStore};
use doc_ocr_gateway::server::{router, AppState};
use doc_ocr_gateway::storage::FileStorage;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "doc_ocr_gateway=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    if config.ocr.credentials.official_key.is_empty() {
        warn!("MINDEE_API_KEY not set, official OCR calls will be rejected upstream");
    }
    if config.ocr.credentials.creative_key.is_empty() {
        warn!("MISTRAL_API_KEY not set, creative OCR calls will be rejected upstream");
    }

    let dispatcher = OcrDispatcher::from_settings(&config.ocr)?;
    info!(
        "OCR dispatcher initialized (timeout: {:?}, creative model: {})",
        config.ocr.upstream_timeout, config.ocr.creative_model
    );

    let documents: Arc<dyn DocumentStore> = match &config.supabase {
        Some(settings) => {
            info!("Persisting documents to Supabase at {}", settings.base_url);
            Arc::new(SupabaseDocumentStore::new(reqwest::Client::new(), settings))
        }
        None => {
            warn!("SUPABASE_URL not set, documents are kept in memory only");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let storage = FileStorage::new(&config.upload_dir);
    info!("Storing uploads in {:?}", storage.root());

    // Build application state
    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        storage,
        documents,
        locale: config.locale,
    };

    let app = router(state, config.max_upload_bytes);

    // Run server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
