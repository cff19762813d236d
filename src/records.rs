//! Persisted document records and the insert-only stores that accept them.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SupabaseSettings;
use crate::ocr::{DocumentType, FieldMap, Provider};

/// Lifecycle status. Records are created validated and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Validated,
}

/// A user-confirmed OCR result, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub user_id: String,
    pub file_path: String,
    pub provider: Provider,
    pub doc_type: DocumentType,
    pub metadata: FieldMap,
    pub full_text: String,
    pub status: DocumentStatus,
    pub created_at: String, // ISO8601 timestamp
}

impl DocumentRecord {
    /// Build a validated record with a fresh id.
    pub fn validated(
        user_id: impl Into<String>,
        file_path: impl Into<String>,
        provider: Provider,
        doc_type: DocumentType,
        metadata: FieldMap,
        full_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            file_path: file_path.into(),
            provider,
            doc_type,
            metadata,
            full_text: full_text.into(),
            status: DocumentStatus::Validated,
            created_at: now_iso8601(),
        }
    }
}

/// Insert-only persistence for document records.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, record: &DocumentRecord) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store used when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<HashMap<String, DocumentRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.inner.read().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        let mut records = self
            .inner
            .write()
            .map_err(|_| anyhow!("document store lock poisoned"))?;
        if records.contains_key(&record.id) {
            return Err(anyhow!("document {} already exists", record.id));
        }
        records.insert(record.id.clone(), record.clone());
        debug!("MemoryDocumentStore: inserted {}", record.id);
        Ok(())
    }
}

// ============================================================================
// Supabase store
// ============================================================================

/// Writes records to the `documents` table through the PostgREST API.
#[derive(Clone)]
pub struct SupabaseDocumentStore {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseDocumentStore {
    pub fn new(client: Client, settings: &SupabaseSettings) -> Self {
        Self {
            client,
            base_url: settings.base_url.clone(),
            service_role_key: settings.service_role_key.clone(),
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for SupabaseDocumentStore {
    async fn insert(&self, record: &DocumentRecord) -> Result<()> {
        let url = format!("{}/rest/v1/documents", self.base_url);

        let body = json!({
            "id": record.id,
            "user_id": record.user_id,
            "file_path": record.file_path,
            "provider": record.provider,
            "doc_type": record.doc_type,
            "metadata": record.metadata,
            "full_text": record.full_text,
            "status": record.status,
            "created_at": record.created_at,
        });

        debug!("Inserting document: {}", record.id);

        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to insert document {}: {} - {}",
                record.id,
                status,
                text
            ));
        }

        info!("Inserted document {} into Supabase", record.id);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Current UTC time as RFC 3339 with second precision, e.g. `2025-02-05T12:00:00Z`.
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
