//! Generate static files

use anyhow::Result;

use crate::generator::Generator;
use crate::Blog;

/// Generate the static site, skipping pages whose output did not change
pub async fn run(blog: &Blog, force: bool) -> Result<()> {
    let start = std::time::Instant::now();

    let generator = Generator::new(blog, blog.provider()?)?;
    if force {
        tracing::info!("Full generation (force=true)");
    }

    let report = generator.generate(force).await?;

    tracing::info!(
        "Generated {} of {} posts, {} files written",
        report.ready,
        report.posts,
        report.written
    );
    if report.not_found > 0 {
        tracing::warn!("{} listed posts could not be found", report.not_found);
    }
    if report.failed > 0 {
        tracing::warn!(
            "{} posts failed to generate; their previous pages were kept",
            report.failed
        );
    }

    let duration = start.elapsed();
    tracing::info!("Generated in {:.2}s", duration.as_secs_f64());

    Ok(())
}
