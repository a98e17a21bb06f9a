//! Built-in blog theme using the Tera template engine
//!
//! Templates and static assets are embedded in the binary. Autoescaping
//! stays on: every value is text except post bodies, which are rendered from
//! structured rich text and marked `safe` explicitly.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{PageCursor, PostSummary, PostView};
use crate::feed::PostFeed;
use crate::helpers::strip_html;
use crate::i18n::I18n;

/// Static files copied to `<public>/assets/`
pub const ASSETS: [(&str, &str); 2] = [
    ("style.css", include_str!("assets/style.css")),
    ("load-more.js", include_str!("assets/load-more.js")),
];

/// Seconds between reloads of the loading placeholder
pub const FALLBACK_REFRESH_SECS: u64 = 2;

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
    base: Context,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig, i18n: &I18n) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("fallback.html", include_str!("theme/fallback.html")),
            ("not_found.html", include_str!("theme/not_found.html")),
            ("unavailable.html", include_str!("theme/unavailable.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("theme/partials/header.html"),
            ),
            (
                "partials/macros.html",
                include_str!("theme/partials/macros.html"),
            ),
        ])?;

        // Register custom filters
        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);

        let mut base = Context::new();
        base.insert("site", &SiteData::new(config, i18n));
        base.insert("t", &i18n.get_all_translations());
        base.insert(
            "load_more_timeout_ms",
            &config.load_more_timeout().as_millis().to_string(),
        );

        Ok(Self { tera, base })
    }

    /// Render a template with given context merged over the base context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        let mut full = self.base.clone();
        full.extend(context.clone());
        Ok(self.tera.render(template_name, &full)?)
    }

    /// The post list with its "load more" control
    pub fn render_list(&self, feed: &PostFeed) -> Result<String> {
        let mut context = Context::new();
        context.insert("feed", &ListData::from(feed));
        self.render("index.html", &context)
    }

    pub fn render_post(&self, post: &PostView) -> Result<String> {
        let mut context = Context::new();
        context.insert("post", post);
        self.render("post.html", &context)
    }

    /// Loading placeholder shown while a post is generated on demand
    pub fn render_fallback(&self) -> Result<String> {
        let mut context = Context::new();
        context.insert("refresh_secs", &FALLBACK_REFRESH_SECS);
        self.render("fallback.html", &context)
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.render("not_found.html", &Context::new())
    }

    pub fn render_unavailable(&self) -> Result<String> {
        let mut context = Context::new();
        context.insert("refresh_secs", &(FALLBACK_REFRESH_SECS * 5));
        self.render("unavailable.html", &context)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub root: String,
    pub language: String,
    pub version: String,
}

impl SiteData {
    fn new(config: &SiteConfig, i18n: &I18n) -> Self {
        let root = format!("/{}/", config.root.trim_matches('/')).replace("//", "/");
        Self {
            title: config.title.clone(),
            root,
            language: i18n.language().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListData<'a> {
    pub posts: &'a [PostSummary],
    pub next_page: &'a PageCursor,
    pub show_load_more: bool,
}

impl<'a> From<&'a PostFeed> for ListData<'a> {
    fn from(feed: &'a PostFeed) -> Self {
        Self {
            posts: feed.posts(),
            next_page: feed.cursor(),
            show_load_more: feed.show_load_more(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedPage;
    use crate::helpers::{DateFormatter, Helpers};
    use crate::provider::testing::{page, post_document};
    use crate::content::{DetailState, PostDetail};

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(&SiteConfig::default(), &I18n::default()).unwrap()
    }

    fn feed(uids: &[&str], next: Option<&str>) -> PostFeed {
        let raw = page(uids, next);
        PostFeed::from_page(FeedPage::from_raw(&raw, &DateFormatter::default()).unwrap())
    }

    #[test]
    fn test_list_with_more_pages_offers_control() {
        let html = renderer()
            .render_list(&feed(&["a", "b"], Some("https://next")))
            .unwrap();
        assert!(html.contains(r#"href="/post/a/""#));
        assert!(html.contains("Post b"));
        assert!(html.contains("25 mar 2021"));
        assert!(html.contains(r#"id="load-more""#));
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains("load-more.js"));
    }

    #[test]
    fn test_list_without_cursor_has_no_control() {
        let html = renderer().render_list(&feed(&["a"], None)).unwrap();
        assert!(!html.contains(r#"id="load-more""#));
        assert!(!html.contains("load-more.js"));
    }

    #[test]
    fn test_list_escapes_titles() {
        let mut raw = page(&["a"], None);
        raw.results[0].data["title"] = serde_json::json!("<b>bold</b>");
        let feed =
            PostFeed::from_page(FeedPage::from_raw(&raw, &DateFormatter::default()).unwrap());
        let html = renderer().render_list(&feed).unwrap();
        assert!(html.contains("&lt;b&gt;bold&lt;&#x2F;b&gt;"));
    }

    #[test]
    fn test_post_page() {
        let helpers = Helpers::new(SiteConfig::default());
        let doc = post_document("a", Some("2021-03-25T19:25:28+0000"));
        let post = PostDetail::from_document(&doc).unwrap();
        let view = PostView::build(&post, &helpers);
        let html = renderer().render_post(&view).unwrap();
        assert!(html.contains(r#"<img src="https:&#x2F;&#x2F;images.prismic.io&#x2F;a.png""#));
        assert!(html.contains("<h2>Proin et varius</h2>"));
        assert!(html.contains("<p>Lorem ipsum dolor sit amet</p>"));
        assert!(html.contains("1 min"));
        assert!(html.contains("25 mar 2021"));
    }

    #[test]
    fn test_post_without_date_omits_it() {
        let helpers = Helpers::new(SiteConfig::default());
        let state = DetailState::resolve(Ok(post_document("a", None)), &helpers).unwrap();
        let DetailState::Ready(view) = state else {
            panic!("expected a ready post");
        };
        let html = renderer().render_post(&view).unwrap();
        assert!(!html.contains("info-date"));
    }

    #[test]
    fn test_placeholders() {
        let renderer = renderer();
        assert!(renderer.render_fallback().unwrap().contains("Carregando..."));
        assert!(renderer
            .render_not_found()
            .unwrap()
            .contains("Post não encontrado"));
        assert!(renderer.render_unavailable().unwrap().contains("http-equiv"));
    }

    #[test]
    fn test_english_strings() {
        let renderer =
            TemplateRenderer::new(&SiteConfig::default(), &I18n::new("en")).unwrap();
        let html = renderer
            .render_list(&feed(&["a"], Some("https://next")))
            .unwrap();
        assert!(html.contains("Load more posts"));
        assert!(html.contains(r#"<html lang="en">"#));
    }
}
