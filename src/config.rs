//! Process configuration.
//!
//! Values come from the environment (optionally seeded from `.env` by
//! `dotenvy` in `main`). Provider credentials are not validated: a missing key
//! becomes an empty string and surfaces as an upstream authentication failure.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::ocr::creative::{DEFAULT_CREATIVE_MODEL, DEFAULT_CREATIVE_URL};
use crate::ocr::official::DEFAULT_OFFICIAL_URL;

const DEFAULT_UPLOAD_DIR: &str = ".data/uploads";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Language of user-facing failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "fr" => Some(Self::Fr),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

/// API keys for both upstream providers. Read-only once loaded.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    pub official_key: String,
    pub creative_key: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("official_key", &redact(&self.official_key))
            .field("creative_key", &redact(&self.creative_key))
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Upstream endpoints and call settings.
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub credentials: ProviderCredentials,
    pub official_url: String,
    pub creative_url: String,
    pub creative_model: String,
    pub upstream_timeout: Duration,
}

/// Supabase connection, present only when both variables are set.
#[derive(Clone)]
pub struct SupabaseSettings {
    pub base_url: String,
    pub service_role_key: String,
}

impl std::fmt::Debug for SupabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseSettings")
            .field("base_url", &self.base_url)
            .field("service_role_key", &redact(&self.service_role_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ocr: OcrSettings,
    pub upload_dir: PathBuf,
    pub supabase: Option<SupabaseSettings>,
    pub bind_addr: String,
    pub locale: Locale,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("UPSTREAM_TIMEOUT_SECS is not a number: {}", raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", raw))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let locale = match get("UI_LOCALE") {
            Some(raw) => Locale::from_tag(&raw)
                .with_context(|| format!("UI_LOCALE must be 'fr' or 'en', got: {}", raw))?,
            None => Locale::default(),
        };

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(base_url), Some(service_role_key)) => Some(SupabaseSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                service_role_key,
            }),
            _ => None,
        };

        Ok(Self {
            ocr: OcrSettings {
                credentials: ProviderCredentials {
                    official_key: get("MINDEE_API_KEY").unwrap_or_default(),
                    creative_key: get("MISTRAL_API_KEY").unwrap_or_default(),
                },
                official_url: get("OFFICIAL_OCR_URL")
                    .unwrap_or_else(|| DEFAULT_OFFICIAL_URL.to_string()),
                creative_url: get("CREATIVE_OCR_URL")
                    .unwrap_or_else(|| DEFAULT_CREATIVE_URL.to_string()),
                creative_model: get("CREATIVE_OCR_MODEL")
                    .unwrap_or_else(|| DEFAULT_CREATIVE_MODEL.to_string()),
                upstream_timeout: Duration::from_secs(timeout_secs),
            },
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            supabase,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            locale,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = load(&[]).unwrap();
        assert_eq!(config.ocr.credentials.official_key, "");
        assert_eq!(config.ocr.credentials.creative_key, "");
        assert_eq!(config.ocr.official_url, DEFAULT_OFFICIAL_URL);
        assert_eq!(config.ocr.creative_url, DEFAULT_CREATIVE_URL);
        assert_eq!(config.ocr.creative_model, DEFAULT_CREATIVE_MODEL);
        assert_eq!(config.ocr.upstream_timeout, Duration::from_secs(60));
        assert_eq!(config.upload_dir, PathBuf::from(".data/uploads"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.locale, Locale::Fr);
        assert!(config.supabase.is_none());
    }

    #[test]
    fn test_reads_credentials_and_overrides() {
        let config = load(&[
            ("MINDEE_API_KEY", "mk"),
            ("MISTRAL_API_KEY", "sk"),
            ("UPSTREAM_TIMEOUT_SECS", "5"),
            ("UI_LOCALE", "EN"),
            ("SUPABASE_URL", "https://db.example.com/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "role"),
        ])
        .unwrap();
        assert_eq!(config.ocr.credentials.official_key, "mk");
        assert_eq!(config.ocr.credentials.creative_key, "sk");
        assert_eq!(config.ocr.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.locale, Locale::En);
        let supabase = config.supabase.unwrap();
        assert_eq!(supabase.base_url, "https://db.example.com");
    }

    #[test]
    fn test_supabase_requires_both_variables() {
        let config = load(&[("SUPABASE_URL", "https://db.example.com")]).unwrap();
        assert!(config.supabase.is_none());
    }

    #[test]
    fn test_rejects_bad_numbers_and_locale() {
        assert!(load(&[("UPSTREAM_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("MAX_UPLOAD_BYTES", "-1")]).is_err());
        assert!(load(&[("UI_LOCALE", "de")]).is_err());
    }

    #[test]
    fn test_debug_output_redacts_keys() {
        let creds = ProviderCredentials {
            official_key: "secret-a".into(),
            creative_key: String::new(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret-a"));
        assert!(rendered.contains("<unset>"));
    }
}
