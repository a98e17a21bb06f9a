//! List posts

use anyhow::Result;

use crate::feed::{FeedPage, LoadOutcome, PostFeed};
use crate::helpers::DateFormatter;
use crate::provider::ContentProvider;
use crate::Blog;

/// Print the post list, optionally following every cursor
pub async fn run(blog: &Blog, all: bool) -> Result<()> {
    let provider = blog.provider()?;
    let helpers = blog.helpers();
    let feed = load(provider.as_ref(), blog, helpers.date_formatter(), all).await?;

    println!("Posts ({}):", feed.posts().len());
    for post in feed.posts() {
        let date = if post.date.is_empty() {
            "-"
        } else {
            post.date.as_str()
        };
        println!("  {} - {} [{}]", date, post.title, post.id);
    }
    if feed.has_more() {
        println!("  ... more posts available (use --all)");
    }

    Ok(())
}

/// Fetch the first page and, with `all`, every page after it
pub async fn load(
    provider: &dyn ContentProvider,
    blog: &Blog,
    dates: &DateFormatter,
    all: bool,
) -> Result<PostFeed> {
    let config = &blog.config.provider;
    let raw = provider
        .query(&config.document_type, config.page_size)
        .await?;
    let mut feed = PostFeed::from_page(FeedPage::from_raw(&raw, dates)?);

    while all && feed.has_more() {
        match feed
            .load_more(provider, dates, blog.config.load_more_timeout())
            .await?
        {
            LoadOutcome::Appended(added) => tracing::debug!("Loaded {} more posts", added),
            LoadOutcome::Ignored => break,
        }
    }

    Ok(feed)
}
