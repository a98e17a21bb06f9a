//! spacetraveling: a statically generated blog backed by a headless CMS
//!
//! Posts live in a Prismic-compatible content service. This crate fetches
//! them, renders a paginated post list and one page per post with embedded
//! Tera templates, and serves the result with on-demand generation and
//! periodic revalidation.

pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod feed;
pub mod generator;
pub mod helpers;
pub mod i18n;
pub mod provider;
pub mod server;
pub mod templates;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use provider::{ContentProvider, PrismicClient};

/// The main blog application
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Source directory (static files copied verbatim)
    pub source_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Blog {
    /// Create a new blog instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)
                .with_context(|| format!("failed to read {:?}", config_path))?
        } else {
            config::SiteConfig::default()
        };
        config.apply_env();

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a blog instance from an already loaded configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);

        Self {
            config,
            base_dir,
            source_dir,
            public_dir,
        }
    }

    /// Client for the configured content service
    pub fn provider(&self) -> Result<Arc<dyn ContentProvider>> {
        let client = PrismicClient::new(&self.config.provider)
            .context("could not create the content provider client")?;
        Ok(Arc::new(client))
    }

    pub fn helpers(&self) -> helpers::Helpers {
        helpers::Helpers::new(self.config.clone())
    }

    /// UI strings for the configured language, with `languages/` overrides
    pub fn i18n(&self) -> Result<i18n::I18n> {
        let mut i18n = i18n::I18n::new(&self.config.language);
        i18n.load_languages(self.base_dir.join("languages"))?;
        Ok(i18n)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("_config.yml")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join(cache::CACHE_DIR)
    }

    /// Generate the static site
    pub async fn generate(&self, force: bool) -> Result<()> {
        commands::generate::run(self, force).await
    }

    /// Clean the public directory and the revalidation ledger
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
