//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `provider.endpoint`
pub const ENDPOINT_ENV: &str = "PRISMIC_ENDPOINT";
/// Environment variable overriding `provider.access_token`
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub public_dir: String,
    pub source_dir: String,

    // Content provider
    #[serde(default)]
    pub provider: ProviderConfig,

    // Generation
    /// Seconds after which a generated page is considered stale
    pub revalidate_secs: u64,
    /// Maximum number of detail pages generated at once
    pub concurrency: usize,

    // Formatting
    /// date-fns style pattern used for publication dates
    pub date_format: String,
    pub words_per_minute: u32,

    // Runtime pagination
    pub load_more_timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            language: "pt-BR".to_string(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            public_dir: "public".to_string(),
            source_dir: "source".to_string(),

            provider: ProviderConfig::default(),

            revalidate_secs: 60 * 30,
            concurrency: 4,

            date_format: "dd MMM yyyy".to_string(),
            words_per_minute: 200,

            load_more_timeout_secs: 10,
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PRISMIC_ENDPOINT` / `PRISMIC_ACCESS_TOKEN` overrides
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                tracing::debug!("Using provider endpoint from {}", ENDPOINT_ENV);
                self.provider.endpoint = endpoint;
            }
        }
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.provider.access_token = Some(token);
            }
        }
    }

    pub fn revalidate_after(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }

    pub fn load_more_timeout(&self) -> Duration {
        Duration::from_secs(self.load_more_timeout_secs.max(1))
    }
}

/// Headless content service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API entry point, e.g. `https://my-repo.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
            page_size: 5,
            timeout_secs: 30,
        }
    }
}
