//! Category-based routing to the matching OCR adapter.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::creative::CreativeDocAdapter;
use super::official::OfficialDocAdapter;
use super::{CanonicalOcrResult, ImageRef, OcrAdapter};
use crate::config::OcrSettings;
use crate::error::OcrError;

/// User-selected document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Official,
    Creative,
}

impl FromStr for Category {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "official" => Ok(Self::Official),
            "creative" => Ok(Self::Creative),
            _ => Err(OcrError::invalid_input("unknown category")),
        }
    }
}

/// Routes each request to exactly one adapter. Holds no mutable state.
#[derive(Clone)]
pub struct OcrDispatcher {
    official: Arc<dyn OcrAdapter>,
    creative: Arc<dyn OcrAdapter>,
}

impl OcrDispatcher {
    pub fn new(official: Arc<dyn OcrAdapter>, creative: Arc<dyn OcrAdapter>) -> Self {
        Self { official, creative }
    }

    /// Build both HTTP adapters sharing one client with the upstream deadline.
    pub fn from_settings(settings: &OcrSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.upstream_timeout)
            .build()
            .context("Failed to build upstream HTTP client")?;

        let official = OfficialDocAdapter::new(client.clone(), settings.credentials.official_key.clone())
            .with_endpoint(settings.official_url.clone());
        let creative = CreativeDocAdapter::new(client, settings.credentials.creative_key.clone())
            .with_endpoint(settings.creative_url.clone())
            .with_model(settings.creative_model.clone());

        Ok(Self::new(Arc::new(official), Arc::new(creative)))
    }

    /// Validate inputs, then run the adapter for `category`.
    ///
    /// Input errors are raised before any network call. Adapter failures are
    /// returned as-is: there is no fallback to the other provider.
    pub async fn process(
        &self,
        category: &str,
        image: ImageRef,
    ) -> Result<CanonicalOcrResult, OcrError> {
        let category: Category = category.parse().inspect_err(|_| {
            warn!("OcrDispatcher: rejected unknown category {:?}", category);
        })?;

        if image.is_empty() {
            return Err(OcrError::invalid_input("missing image reference"));
        }

        let adapter = self.adapter_for(category);
        info!(
            "OcrDispatcher: {:?} -> {} for {}",
            category,
            adapter.provider().as_str(),
            image.describe()
        );

        adapter.process(&image).await
    }

    fn adapter_for(&self, category: Category) -> &dyn OcrAdapter {
        match category {
            Category::Official => self.official.as_ref(),
            Category::Creative => self.creative.as_ref(),
        }
    }
}
