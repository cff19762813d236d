//! Error taxonomy for OCR dispatch and the blob store.
//!
//! Parsing degradation is deliberately absent here: malformed provider output
//! is absorbed into fallback values by [`crate::ocr::parser`].

use crate::config::Locale;

/// Upstream failure reason for the official document provider.
pub const OFFICIAL_PROVIDER_FAILED: &str = "official-provider-failed";
/// Upstream failure reason for the creative document provider.
pub const CREATIVE_PROVIDER_FAILED: &str = "creative-provider-failed";
/// Upstream failure reason when the call exceeded its deadline.
pub const UPSTREAM_TIMEOUT: &str = "timeout";

/// Failure of a single OCR dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OcrError {
    /// Unknown category or empty image reference. Raised before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The selected provider did not answer successfully. Never retried.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl OcrError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::Upstream(reason.into())
    }

    /// Map a transport error to an upstream failure, keeping timeouts distinct.
    pub(crate) fn from_transport(err: &reqwest::Error, reason: &str) -> Self {
        if err.is_timeout() {
            Self::upstream(UPSTREAM_TIMEOUT)
        } else {
            Self::upstream(reason)
        }
    }

    /// Generic message shown to the end user. Never carries upstream detail.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match self {
            Self::InvalidInput(_) => Notice::MissingParameters.text(locale),
            Self::Upstream(_) => Notice::OcrFailed.text(locale),
        }
    }
}

/// Failure of the local blob store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-facing notices returned by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    MissingFile,
    MissingParameters,
    IncompleteData,
    OcrFailed,
    NotFound,
    ServerError,
}

impl Notice {
    pub fn text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::MissingFile, Locale::Fr) => "Aucun fichier fourni",
            (Self::MissingFile, Locale::En) => "No file provided",
            (Self::MissingParameters, Locale::Fr) => "Paramètres manquants",
            (Self::MissingParameters, Locale::En) => "Missing parameters",
            (Self::IncompleteData, Locale::Fr) => "Données incomplètes",
            (Self::IncompleteData, Locale::En) => "Incomplete data",
            (Self::OcrFailed, Locale::Fr) => "Erreur OCR",
            (Self::OcrFailed, Locale::En) => "OCR failed",
            (Self::NotFound, Locale::Fr) => "Fichier introuvable",
            (Self::NotFound, Locale::En) => "File not found",
            (Self::ServerError, Locale::Fr) => "Erreur serveur",
            (Self::ServerError, Locale::En) => "Server error",
        }
    }
}
