//! Generator module - renders the post list and post pages to static HTML
//!
//! The list and every post known at build time are written to the public
//! directory. The server reuses the same per-route functions to generate
//! unknown posts on demand and to revalidate stale pages.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::cache::{self, CacheDb, Freshness};
use crate::content::{DetailError, DetailState};
use crate::feed::{FeedPage, PostFeed};
use crate::helpers::{is_route_safe, post_path, Helpers};
use crate::provider::ContentProvider;
use crate::templates::{TemplateRenderer, ASSETS};
use crate::Blog;

/// Route of the post list
pub const LIST_ROUTE: &str = "/";

/// Route of a post page
pub fn post_route(uid: &str) -> String {
    format!("/{}", post_path(uid))
}

/// Output file of a route, relative to the public directory
pub fn output_path(route: &str) -> String {
    let dir = route.trim_matches('/');
    if dir.is_empty() {
        "index.html".to_string()
    } else {
        format!("{}/index.html", dir)
    }
}

/// Summary of a full generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Posts on the build-time list page
    pub posts: usize,
    /// Post pages written or confirmed unchanged
    pub ready: usize,
    pub not_found: usize,
    /// Post pages whose generation failed; previous output was kept
    pub failed: usize,
    /// Files actually rewritten
    pub written: usize,
}

/// Static site generator using the embedded Tera templates
pub struct Generator {
    blog: Blog,
    provider: Arc<dyn ContentProvider>,
    renderer: TemplateRenderer,
    helpers: Helpers,
    cache: Mutex<CacheDb>,
    written: AtomicUsize,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog, provider: Arc<dyn ContentProvider>) -> Result<Self> {
        let renderer = TemplateRenderer::new(&blog.config, &blog.i18n()?)?;

        let mut cache = CacheDb::load(&blog.base_dir);
        cache.check_config(cache::hash_file(&blog.config_path())?);

        Ok(Self {
            blog: blog.clone(),
            provider,
            renderer,
            helpers: blog.helpers(),
            cache: Mutex::new(cache),
            written: AtomicUsize::new(0),
        })
    }

    pub fn blog(&self) -> &Blog {
        &self.blog
    }

    pub fn provider(&self) -> &dyn ContentProvider {
        self.provider.as_ref()
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    /// Generate the entire site
    pub async fn generate(&self, force: bool) -> Result<GenerateReport> {
        if force {
            self.cache.lock().await.routes.clear();
        }
        self.written.store(0, Ordering::SeqCst);

        // Ensure public directory exists
        fs::create_dir_all(&self.blog.public_dir)?;

        self.write_assets()?;
        self.copy_source_assets()?;

        let page = self.generate_list().await?;
        let mut report = GenerateReport {
            posts: page.results.len(),
            ..Default::default()
        };

        let uids: Vec<String> = page.results.iter().map(|post| post.id.clone()).collect();
        let outcomes: Vec<_> = stream::iter(uids)
            .map(|uid| async move {
                let outcome = self.generate_post(&uid).await;
                (uid, outcome)
            })
            .buffer_unordered(self.blog.config.concurrency.max(1))
            .collect()
            .await;

        for (uid, outcome) in outcomes {
            match outcome {
                Ok(DetailState::Ready(_)) => report.ready += 1,
                Ok(_) => {
                    tracing::warn!("Post {} is listed but could not be found", uid);
                    report.not_found += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to generate post {}: {}", uid, e);
                    report.failed += 1;
                }
            }
        }

        self.write_page("/404.html", "404.html", &self.renderer.render_not_found()?)
            .await?;

        self.save_cache().await?;
        report.written = self.written.load(Ordering::SeqCst);
        Ok(report)
    }

    /// Fetch the first page of posts and render the list
    pub async fn generate_list(&self) -> Result<FeedPage> {
        let provider = &self.blog.config.provider;
        let raw = self
            .provider
            .query(&provider.document_type, provider.page_size)
            .await?;
        let page = FeedPage::from_raw(&raw, self.helpers.date_formatter())?;
        tracing::info!(
            "Fetched {} posts (more: {})",
            page.results.len(),
            !page.next_page.is_exhausted()
        );

        let html = self
            .renderer
            .render_list(&PostFeed::from_page(page.clone()))?;
        self.write_page(LIST_ROUTE, &output_path(LIST_ROUTE), &html)
            .await?;
        Ok(page)
    }

    /// Fetch one post and write its page.
    ///
    /// A missing post removes any page generated for it earlier. Any other
    /// failure leaves the previous page in place.
    pub async fn generate_post(&self, uid: &str) -> Result<DetailState, DetailError> {
        if !is_route_safe(uid) {
            tracing::debug!("Rejecting post id {:?}", uid);
            return Ok(DetailState::NotFound);
        }

        let route = post_route(uid);
        let fetched = self
            .provider
            .get_by_uid(&self.blog.config.provider.document_type, uid)
            .await;
        let state = DetailState::resolve(fetched, &self.helpers)?;

        match &state {
            DetailState::Ready(view) => {
                let html = self.renderer.render_post(view)?;
                self.write_page(&route, &output_path(&route), &html).await?;
            }
            DetailState::NotFound => self.remove_page(&route).await?,
            DetailState::Fallback => {}
        }
        Ok(state)
    }

    /// Whether `route` is due for regeneration
    pub async fn is_stale(&self, route: &str) -> bool {
        self.cache
            .lock()
            .await
            .is_stale(route, self.blog.config.revalidate_after())
    }

    /// Whether `route` has generated output on disk, recorded or not
    pub fn has_output(&self, route: &str) -> bool {
        self.output_file(route).is_file()
    }

    pub fn output_file(&self, route: &str) -> PathBuf {
        self.blog.public_dir.join(output_path(route))
    }

    pub async fn save_cache(&self) -> Result<()> {
        self.cache.lock().await.save(&self.blog.base_dir)
    }

    /// Write a page unless the same output is already on disk
    async fn write_page(&self, route: &str, relative: &str, html: &str) -> Result<bool> {
        let path = self.blog.public_dir.join(relative);
        {
            let mut cache = self.cache.lock().await;
            if cache.freshness(route, html) == Freshness::Unchanged && path.exists() {
                cache.record(route, relative, html);
                tracing::debug!("Unchanged: {}", route);
                return Ok(false);
            }
        }

        // the ledger only learns about output that reached the disk
        write_atomic(&path, html)?;
        self.cache.lock().await.record(route, relative, html);
        self.written.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Generated: {}", route);
        Ok(true)
    }

    async fn remove_page(&self, route: &str) -> Result<()> {
        self.cache.lock().await.remove(route);
        let path = self.output_file(route);
        if path.is_file() {
            fs::remove_file(&path)?;
            tracing::info!("Removed page of a deleted post: {}", route);
        }
        Ok(())
    }

    /// Write the theme's stylesheet and scripts
    fn write_assets(&self) -> Result<()> {
        let assets_dir = self.blog.public_dir.join("assets");
        fs::create_dir_all(&assets_dir)?;
        for (name, content) in ASSETS {
            let dest = assets_dir.join(name);
            if fs::read_to_string(&dest).ok().as_deref() != Some(content) {
                fs::write(dest, content)?;
            }
        }
        Ok(())
    }

    /// Copy source assets (images, favicon, ...) to public directory
    fn copy_source_assets(&self) -> Result<()> {
        let source_dir = &self.blog.source_dir;
        if !source_dir.exists() {
            return Ok(());
        }

        for entry in WalkDir::new(source_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            // Skip hidden files
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
            {
                continue;
            }

            let relative = path.strip_prefix(source_dir)?;
            let dest = self.blog.public_dir.join(relative);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::copy(path, &dest)?;
        }

        Ok(())
    }
}

/// Replace `path` in one step so a reader never sees a half-written page
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("html.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
