//! Post view models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RichText;

/// A post as shown in the list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Document uid, used in the detail route
    pub id: String,
    pub publication_date: Option<DateTime<Utc>>,
    /// Publication date rendered for display, empty when unknown
    pub date: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// One heading plus its body inside a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    pub heading: String,
    pub body: RichText,
}

/// A full post as shown on its detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: String,
    pub publication_date: Option<DateTime<Utc>>,
    pub title: String,
    pub author: String,
    pub banner_url: String,
    pub content: Vec<ContentSection>,
}

/// Where the next page of the list lives, if anywhere.
///
/// An absent or empty URL means the list is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub struct PageCursor(Option<String>);

impl PageCursor {
    pub fn new(url: Option<String>) -> Self {
        Self(url.filter(|u| !u.trim().is_empty()))
    }

    pub fn exhausted() -> Self {
        Self(None)
    }

    pub fn url(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.0.is_none()
    }
}

impl From<Option<String>> for PageCursor {
    fn from(url: Option<String>) -> Self {
        Self::new(url)
    }
}

impl From<PageCursor> for Option<String> {
    fn from(cursor: PageCursor) -> Self {
        cursor.0
    }
}
