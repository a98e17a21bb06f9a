//! Revalidation ledger for generated pages
//!
//! Every route written to the public directory gets an entry with the time it
//! was generated and a hash of its HTML. The hash lets generation skip
//! rewriting unchanged pages; the timestamp tells the server when a page is
//! stale and should be regenerated in the background.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Cache directory, relative to the site base directory
pub const CACHE_DIR: &str = ".spacetraveling-cache";

/// Ledger file inside [`CACHE_DIR`]
const CACHE_FILE: &str = "db.json";

/// A generated route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the generated HTML
    pub content_hash: u64,
    /// Generation time (as unix timestamp)
    pub generated_at: u64,
    /// Output path relative to public dir
    pub output_path: String,
}

/// Ledger of generated routes
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheDb {
    /// Version of the cache format
    pub version: u32,
    /// Hash of the site config (changes invalidate every route)
    pub config_hash: u64,
    /// Entries keyed by route, e.g. `/` or `/post/my-post/`
    pub routes: HashMap<String, CacheEntry>,
}

/// What happened when a page was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Output differs from the last generation and must be written
    Changed,
    /// Same output as before; only the timestamp moved
    Unchanged,
}

impl CacheDb {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_DIR).join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<CacheDb>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Cache version mismatch, rebuilding cache"),
                Err(e) => tracing::warn!("Ignoring unreadable cache {:?}: {}", cache_path, e),
            }
        }
        Self::new()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Drop every route if the site config changed since the last run
    pub fn check_config(&mut self, config_hash: u64) {
        if self.config_hash != config_hash {
            if self.config_hash != 0 {
                tracing::info!("Config changed, every page will be regenerated");
            }
            self.routes.clear();
            self.config_hash = config_hash;
        }
    }

    /// Compare `html` with the output last recorded for `route`
    pub fn freshness(&self, route: &str, html: &str) -> Freshness {
        match self.routes.get(route) {
            Some(entry) if entry.content_hash == hash_content(html) => Freshness::Unchanged,
            _ => Freshness::Changed,
        }
    }

    /// Record a page once its output is on disk
    pub fn record(&mut self, route: &str, output_path: &str, html: &str) {
        self.routes.insert(
            route.to_string(),
            CacheEntry {
                content_hash: hash_content(html),
                generated_at: now(),
                output_path: output_path.to_string(),
            },
        );
    }

    /// Whether `route` is missing or older than `revalidate`
    pub fn is_stale(&self, route: &str, revalidate: Duration) -> bool {
        match self.routes.get(route) {
            Some(entry) => now().saturating_sub(entry.generated_at) >= revalidate.as_secs(),
            None => true,
        }
    }

    /// Forget a route, e.g. once its document is gone
    pub fn remove(&mut self, route: &str) -> Option<CacheEntry> {
        self.routes.remove(route)
    }
}

/// Calculate a hash for page content
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Calculate a hash for a file on disk, 0 when it does not exist
pub fn hash_file(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let content = fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
