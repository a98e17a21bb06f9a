//! Content provider - the headless content service that stores posts
//!
//! Everything outside this module talks to the service through the
//! [`ContentProvider`] trait, so generation and pagination can be exercised
//! against an in-memory provider.

mod client;
mod error;
mod wire;

pub use client::{without_access_token, PrismicClient};
pub use error::ProviderError;
pub use wire::{RawDocument, RawPage};

use async_trait::async_trait;

/// Read access to the content service
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// First page of documents of one type
    async fn query(&self, document_type: &str, page_size: usize) -> Result<RawPage, ProviderError>;

    /// A single document by uid; `ProviderError::NotFound` when it does not exist
    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<RawDocument, ProviderError>;

    /// A follow-up page at an opaque cursor URL
    async fn fetch_page(&self, url: &str) -> Result<RawPage, ProviderError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory provider for tests

    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned pages and documents
    #[derive(Default)]
    pub struct MemoryProvider {
        pub first_page: Mutex<Option<RawPage>>,
        pub pages: Mutex<HashMap<String, RawPage>>,
        pub documents: Mutex<HashMap<String, RawDocument>>,
        /// Cursor URLs that answer with HTTP 500
        pub failing: Mutex<Vec<String>>,
        pub delay: Option<Duration>,
        pub fetches: AtomicUsize,
    }

    impl MemoryProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_first_page(self, page: RawPage) -> Self {
            *self.first_page.lock().unwrap() = Some(page);
            self
        }

        pub fn with_page(self, url: &str, page: RawPage) -> Self {
            self.pages.lock().unwrap().insert(url.to_string(), page);
            self
        }

        pub fn with_document(self, doc: RawDocument) -> Self {
            let uid = doc.uid.clone().unwrap_or_default();
            self.documents.lock().unwrap().insert(uid, doc);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn fail(&self, url: &str) {
            self.failing.lock().unwrap().push(url.to_string());
        }

        pub fn recover(&self, url: &str) {
            self.failing.lock().unwrap().retain(|u| u != url);
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentProvider for MemoryProvider {
        async fn query(&self, _document_type: &str, _page_size: usize) -> Result<RawPage, ProviderError> {
            Ok(self.first_page.lock().unwrap().clone().unwrap_or_default())
        }

        async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<RawDocument, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.documents
                .lock()
                .unwrap()
                .get(uid)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound {
                    document_type: document_type.to_string(),
                    uid: uid.to_string(),
                })
        }

        async fn fetch_page(&self, url: &str) -> Result<RawPage, ProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().unwrap().iter().any(|u| u == url) {
                return Err(ProviderError::Status {
                    status: 500,
                    url: url.to_string(),
                });
            }
            self.pages
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| ProviderError::Status {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    /// A post document the way the content API returns it
    pub fn post_document(uid: &str, date: Option<&str>) -> RawDocument {
        RawDocument {
            id: Some(format!("id-{}", uid)),
            uid: Some(uid.to_string()),
            document_type: Some("posts".to_string()),
            first_publication_date: date.map(str::to_string),
            last_publication_date: None,
            data: json!({
                "title": format!("Post {}", uid),
                "subtitle": format!("Subtitle {}", uid),
                "author": "Joseph Oliveira",
                "banner": { "url": format!("https://images.prismic.io/{}.png", uid) },
                "content": [
                    {
                        "heading": "Proin et varius",
                        "body": [
                            { "type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": [] }
                        ]
                    }
                ]
            }),
        }
    }

    pub fn page(uids: &[&str], next_page: Option<&str>) -> RawPage {
        RawPage {
            results: uids
                .iter()
                .map(|uid| post_document(uid, Some("2021-03-25T19:25:28+0000")))
                .collect(),
            next_page: next_page.map(str::to_string),
            page: None,
            total_pages: None,
        }
    }

    pub fn with_data(mut doc: RawDocument, data: Value) -> RawDocument {
        doc.data = data;
        doc
    }
}
