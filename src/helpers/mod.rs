//! Presentation helpers
//!
//! Pure formatting functions shared by the list and detail flows: dates,
//! reading time, HTML escaping and URLs. Nothing here performs I/O.

mod date;
mod html;
mod reading;
mod url;

pub use date::*;
pub use html::*;
pub use reading::*;
pub use url::*;

use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::content::ContentSection;

/// Formatting settings resolved from the site configuration
#[derive(Debug, Clone)]
pub struct Helpers {
    config: SiteConfig,
    dates: DateFormatter,
}

impl Helpers {
    /// Create a new helpers instance
    pub fn new(config: SiteConfig) -> Self {
        let dates = DateFormatter::new(&config.date_format, Locale::from_tag(&config.language));
        Self { config, dates }
    }

    /// Format a publication date, empty when missing
    pub fn date(&self, date: Option<&DateTime<Utc>>) -> String {
        self.dates.format(date)
    }

    pub fn date_formatter(&self) -> &DateFormatter {
        &self.dates
    }

    /// Reading time in minutes for a post body
    pub fn reading_time(&self, sections: &[ContentSection]) -> u32 {
        estimate_reading_time(sections, self.config.words_per_minute)
    }

    /// Absolute URL of a post detail page
    pub fn permalink(&self, uid: &str) -> String {
        full_url_for(&self.config, &post_path(uid))
    }
}
