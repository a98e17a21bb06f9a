//! Content module - view models, rich text and the detail page lifecycle

pub mod detail;
mod error;
mod mapping;
mod post;
pub mod richtext;

pub use detail::{DetailError, DetailRegistry, DetailState, Lookup, PostView, SectionView};
pub use error::ContentError;
pub use post::{ContentSection, PageCursor, PostDetail, PostSummary};
pub use richtext::RichText;
