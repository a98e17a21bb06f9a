//! Post feed - the growing list of posts behind the "load more" control
//!
//! A [`PostFeed`] is owned by one list page instance. It holds the posts shown
//! so far, in arrival order, and the cursor of the next page. Loading is a
//! two-step transition (`begin_load` then `complete_load`) so that a second
//! trigger while a fetch is in flight is ignored instead of racing.

use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::content::{ContentError, PageCursor, PostSummary};
use crate::helpers::DateFormatter;
use crate::provider::{ContentProvider, ProviderError, RawPage};

/// Why loading a page failed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("could not fetch the next page: {0}")]
    Fetch(#[from] ProviderError),

    #[error("the next page contained an invalid post: {0}")]
    Mapping(#[from] ContentError),

    #[error("the next page did not arrive within {0:?}")]
    Timeout(Duration),
}

impl FeedError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FeedError::Timeout(_) => true,
            FeedError::Fetch(e) => e.is_timeout(),
            FeedError::Mapping(_) => false,
        }
    }
}

/// One page of list entries plus the cursor after it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub results: Vec<PostSummary>,
    pub next_page: PageCursor,
}

impl FeedPage {
    /// Validate and map a raw provider page
    pub fn from_raw(raw: &RawPage, dates: &DateFormatter) -> Result<Self, ContentError> {
        let results = raw
            .results
            .iter()
            .map(|doc| PostSummary::from_document(doc, dates))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            results,
            next_page: raw.cursor(),
        })
    }
}

/// Fetch and map the page at `url`, giving up after `timeout`
pub async fn fetch_page<P: ContentProvider + ?Sized>(
    provider: &P,
    url: &str,
    dates: &DateFormatter,
    timeout: Duration,
) -> Result<FeedPage, FeedError> {
    let raw = tokio::time::timeout(timeout, provider.fetch_page(url))
        .await
        .map_err(|_| FeedError::Timeout(timeout))??;
    Ok(FeedPage::from_raw(&raw, dates)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum FeedStatus {
    Idle,
    Loading,
    /// Last load failed; posts and cursor are unchanged and a retry is allowed
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Number of new posts appended
    Appended(usize),
    /// A load was already in flight or the list is exhausted
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PostFeed {
    posts: Vec<PostSummary>,
    seen: HashSet<String>,
    cursor: PageCursor,
    status: FeedStatus,
}

impl PostFeed {
    /// Seed the feed from the build-time page
    pub fn new(initial: Vec<PostSummary>, cursor: PageCursor) -> Self {
        let mut feed = Self {
            posts: Vec::with_capacity(initial.len()),
            seen: HashSet::new(),
            cursor,
            status: FeedStatus::Idle,
        };
        feed.append(initial);
        feed
    }

    pub fn from_page(page: FeedPage) -> Self {
        Self::new(page.results, page.next_page)
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    pub fn has_more(&self) -> bool {
        !self.cursor.is_exhausted()
    }

    /// Whether the "load more" control should be offered
    pub fn show_load_more(&self) -> bool {
        self.has_more() && self.status != FeedStatus::Loading
    }

    /// Claim the cursor for a fetch.
    ///
    /// Returns `None` when a load is already in flight or nothing is left.
    pub fn begin_load(&mut self) -> Option<String> {
        if self.status == FeedStatus::Loading {
            return None;
        }
        let url = self.cursor.url()?.to_string();
        self.status = FeedStatus::Loading;
        Some(url)
    }

    /// Apply the result of the fetch started by [`begin_load`](Self::begin_load)
    pub fn complete_load(&mut self, result: Result<FeedPage, FeedError>) -> Result<usize, FeedError> {
        if self.status != FeedStatus::Loading {
            tracing::warn!("Discarding a page that no load was waiting for");
            return Ok(0);
        }

        match result {
            Ok(page) => {
                let added = self.append(page.results);
                self.cursor = page.next_page;
                self.status = FeedStatus::Idle;
                tracing::debug!(
                    "Appended {} posts ({} total, more: {})",
                    added,
                    self.posts.len(),
                    self.has_more()
                );
                Ok(added)
            }
            Err(e) => {
                self.status = FeedStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch the next page and append it
    pub async fn load_more<P: ContentProvider + ?Sized>(
        &mut self,
        provider: &P,
        dates: &DateFormatter,
        timeout: Duration,
    ) -> Result<LoadOutcome, FeedError> {
        let Some(url) = self.begin_load() else {
            return Ok(LoadOutcome::Ignored);
        };
        let result = fetch_page(provider, &url, dates, timeout).await;
        self.complete_load(result).map(LoadOutcome::Appended)
    }

    fn append(&mut self, posts: Vec<PostSummary>) -> usize {
        let before = self.posts.len();
        for post in posts {
            if self.seen.insert(post.id.clone()) {
                self.posts.push(post);
            } else {
                tracing::debug!("Skipping duplicate post {}", post.id);
            }
        }
        self.posts.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{page, MemoryProvider};

    const TIMEOUT: Duration = Duration::from_secs(5);
    const NEXT: &str = "https://blog.cdn.prismic.io/api/v2/documents/search?page=2";

    fn dates() -> DateFormatter {
        DateFormatter::default()
    }

    fn first_feed(next: Option<&str>) -> PostFeed {
        let raw = page(&["p1", "p2", "p3", "p4", "p5"], next);
        PostFeed::from_page(FeedPage::from_raw(&raw, &dates()).unwrap())
    }

    fn ids(feed: &PostFeed) -> Vec<&str> {
        feed.posts().iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_initialize_makes_no_request() {
        let feed = first_feed(Some(NEXT));
        assert_eq!(feed.posts().len(), 5);
        assert_eq!(feed.posts()[0].date, "25 mar 2021");
        assert!(feed.show_load_more());
        assert_eq!(feed.status(), &FeedStatus::Idle);
    }

    #[test]
    fn test_no_cursor_no_control() {
        let feed = first_feed(None);
        assert!(!feed.has_more());
        assert!(!feed.show_load_more());

        let feed = first_feed(Some(""));
        assert!(!feed.show_load_more());
    }

    #[tokio::test]
    async fn test_load_more_appends_in_order_and_exhausts() {
        let provider = MemoryProvider::new().with_page(NEXT, page(&["p6", "p7", "p8"], None));
        let mut feed = first_feed(Some(NEXT));

        let outcome = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Appended(3));
        assert_eq!(ids(&feed), ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"]);
        assert!(!feed.show_load_more());

        // exhausted: nothing else is fetched
        let outcome = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Ignored);
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped() {
        let second = "https://x/page3";
        let provider = MemoryProvider::new().with_page(NEXT, page(&["p5", "p6"], Some(second)));
        let mut feed = first_feed(Some(NEXT));

        let outcome = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Appended(1));
        assert_eq!(ids(&feed), ["p1", "p2", "p3", "p4", "p5", "p6"]);
        assert_eq!(feed.cursor().url(), Some(second));
    }

    #[test]
    fn test_second_begin_is_ignored_while_loading() {
        let mut feed = first_feed(Some(NEXT));
        assert_eq!(feed.begin_load().as_deref(), Some(NEXT));
        assert!(!feed.show_load_more());
        assert_eq!(feed.begin_load(), None);
    }

    #[test]
    fn test_stray_completion_is_discarded() {
        let mut feed = first_feed(Some(NEXT));
        let page = FeedPage {
            results: Vec::new(),
            next_page: PageCursor::exhausted(),
        };
        assert_eq!(feed.complete_load(Ok(page)).unwrap(), 0);
        // cursor untouched because no load was in flight
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_retryable() {
        let provider = MemoryProvider::new().with_page(NEXT, page(&["p6"], None));
        provider.fail(NEXT);
        let mut feed = first_feed(Some(NEXT));

        let err = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(ProviderError::Status { status: 500, .. })));
        assert!(matches!(feed.status(), FeedStatus::Failed(_)));
        assert_eq!(feed.posts().len(), 5);
        assert_eq!(feed.cursor().url(), Some(NEXT));
        assert!(feed.show_load_more());

        provider.recover(NEXT);
        let outcome = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Appended(1));
        assert_eq!(feed.status(), &FeedStatus::Idle);
    }

    #[tokio::test]
    async fn test_malformed_page_is_a_mapping_error() {
        let mut bad = page(&["p6"], None);
        bad.results[0].data = serde_json::json!({ "title": "no author" });
        let provider = MemoryProvider::new().with_page(NEXT, bad);
        let mut feed = first_feed(Some(NEXT));

        let err = feed.load_more(&provider, &dates(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, FeedError::Mapping(_)));
        assert_eq!(feed.posts().len(), 5);
    }

    #[tokio::test]
    async fn test_stalled_fetch_times_out() {
        let provider = MemoryProvider::new()
            .with_page(NEXT, page(&["p6"], None))
            .with_delay(Duration::from_millis(500));
        let mut feed = first_feed(Some(NEXT));

        let err = feed
            .load_more(&provider, &dates(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(feed.show_load_more());
    }
}
