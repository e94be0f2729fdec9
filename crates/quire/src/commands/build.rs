//! Full site build command.

use anyhow::{Context, Result};
use quire_static::{Site, SiteConfig};

/// Run the build command.
pub async fn run(config: SiteConfig) -> Result<()> {
    tracing::info!("Building site...");

    let output = config.output_dir.clone();
    let report = tokio::task::spawn_blocking(move || Site::new(config).build())
        .await
        .context("Build task panicked")??;

    tracing::info!(
        "Built {} pages in {}ms",
        report.pages,
        report.duration_ms
    );
    tracing::info!("Output: {}", output.display());

    Ok(())
}
