//! Detail page generation state
//!
//! A post page is `Fallback` while it is being generated on demand, then
//! either `Ready` or `NotFound`. Formatting only ever happens on the way into
//! `Ready`, so a page in `Fallback` never touches post data.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{ContentError, PostDetail};
use crate::helpers::{date_xml, Helpers};
use crate::provider::{ProviderError, RawDocument};

/// A post formatted for its detail page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub author: String,
    pub banner_url: String,
    /// Absolute URL of the detail page
    pub permalink: String,
    /// Empty when the post has no publication date
    pub date: String,
    /// ISO 8601 form of the publication date, empty when unknown
    pub datetime: String,
    pub reading_time: u32,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub heading: String,
    pub html: String,
}

impl PostView {
    pub fn build(post: &PostDetail, helpers: &Helpers) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            author: post.author.clone(),
            banner_url: post.banner_url.clone(),
            permalink: helpers.permalink(&post.id),
            date: helpers.date(post.publication_date.as_ref()),
            datetime: post
                .publication_date
                .as_ref()
                .map(date_xml)
                .unwrap_or_default(),
            reading_time: helpers.reading_time(&post.content),
            sections: post
                .content
                .iter()
                .map(|section| SectionView {
                    heading: section.heading.clone(),
                    html: section.body.as_html(),
                })
                .collect(),
        }
    }
}

/// Why a detail page could not be generated
#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Content(#[from] ContentError),
    /// Rendering or writing the page failed
    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

/// Where a detail page stands
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    /// Generation in flight; show the loading placeholder
    Fallback,
    Ready(Arc<PostView>),
    /// The provider has no such document
    NotFound,
}

impl DetailState {
    /// Resolve a fetch into a terminal state.
    ///
    /// A missing document becomes `NotFound`; any other failure is returned
    /// so the caller can keep the last good page and retry later.
    pub fn resolve(
        fetched: Result<RawDocument, ProviderError>,
        helpers: &Helpers,
    ) -> Result<Self, DetailError> {
        match fetched {
            Ok(doc) => {
                let post = PostDetail::from_document(&doc)?;
                Ok(DetailState::Ready(Arc::new(PostView::build(&post, helpers))))
            }
            Err(e) if e.is_not_found() => Ok(DetailState::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// What a page request should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// No generation in flight: the uid is now in `Fallback` and the caller
    /// must start one
    Started,
    /// Another request already started generation
    Pending,
    /// The provider recently reported no such document
    NotFound,
}

/// Most missing uids remembered at once
const MAX_MISSES: usize = 1024;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Generating,
    /// When the miss was recorded, plus its order among misses
    Missing(Instant, u64),
}

/// Detail pages being generated on demand, shared by all requests.
///
/// A post that resolves to `Ready` is on disk from then on and is not kept
/// here. A miss is remembered for `retry_after`, so the loading page settles
/// on 404, and then the provider is asked again.
#[derive(Debug)]
pub struct DetailRegistry {
    slots: RwLock<HashMap<String, Slot>>,
    retry_after: Duration,
    max_misses: usize,
    misses: AtomicU64,
}

impl DetailRegistry {
    pub fn new(retry_after: Duration) -> Self {
        Self::with_max_misses(retry_after, MAX_MISSES)
    }

    pub fn with_max_misses(retry_after: Duration, max_misses: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            retry_after,
            max_misses: max_misses.max(1),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `uid`, entering `Fallback` unless it is in flight or a
    /// recent miss
    pub async fn begin(&self, uid: &str) -> Lookup {
        let mut slots = self.slots.write().await;
        match slots.get(uid) {
            Some(Slot::Generating) => return Lookup::Pending,
            Some(Slot::Missing(since, _)) if since.elapsed() < self.retry_after => {
                return Lookup::NotFound
            }
            _ => {}
        }
        slots.insert(uid.to_string(), Slot::Generating);
        tracing::debug!("Detail page {} entered fallback", uid);
        Lookup::Started
    }

    /// Record the outcome of a generation started by [`begin`](Self::begin).
    ///
    /// A failed generation forgets the uid so that the next request retries.
    pub async fn complete(&self, uid: &str, outcome: Result<DetailState, DetailError>) {
        let mut slots = self.slots.write().await;
        match outcome {
            Ok(DetailState::NotFound) => {
                tracing::debug!("Detail page {} not found", uid);
                slots.remove(uid);
                self.prune(&mut slots);
                let order = self.misses.fetch_add(1, Ordering::Relaxed);
                slots.insert(uid.to_string(), Slot::Missing(Instant::now(), order));
            }
            Ok(_) => {
                tracing::debug!("Detail page {} resolved", uid);
                slots.remove(uid);
            }
            Err(e) => {
                tracing::warn!("Generating post {} failed: {}", uid, e);
                if matches!(slots.get(uid), Some(Slot::Generating)) {
                    slots.remove(uid);
                }
            }
        }
    }

    /// Drop expired misses, then the oldest ones until one more fits
    fn prune(&self, slots: &mut HashMap<String, Slot>) {
        slots.retain(|_, slot| match slot {
            Slot::Missing(since, _) => since.elapsed() < self.retry_after,
            Slot::Generating => true,
        });

        let mut misses: Vec<(String, u64)> = slots
            .iter()
            .filter_map(|(uid, slot)| match slot {
                Slot::Missing(_, order) => Some((uid.clone(), *order)),
                Slot::Generating => None,
            })
            .collect();
        if misses.len() < self.max_misses {
            return;
        }
        misses.sort_by_key(|(_, order)| *order);
        let excess = misses.len() + 1 - self.max_misses;
        for (uid, _) in misses.into_iter().take(excess) {
            slots.remove(&uid);
        }
    }

    pub async fn state(&self, uid: &str) -> Option<DetailState> {
        match self.slots.read().await.get(uid)? {
            Slot::Generating => Some(DetailState::Fallback),
            Slot::Missing(since, _) if since.elapsed() < self.retry_after => {
                Some(DetailState::NotFound)
            }
            Slot::Missing(..) => None,
        }
    }

    /// Number of uids in flight or remembered as missing
    pub async fn tracked(&self) -> usize {
        self.slots.read().await.len()
    }
}
