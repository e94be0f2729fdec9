//! Single-stage commands.

use anyhow::{Context, Result};
use quire_static::{Site, SiteConfig, Stage};

/// Run `stages` in order, stopping at the first failure.
pub async fn run(config: SiteConfig, stages: &[Stage]) -> Result<()> {
    let stages = stages.to_vec();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let site = Site::new(config);
        for stage in stages {
            tracing::info!("Running {}", stage);
            site.run(stage)
                .with_context(|| format!("Stage {} failed", stage))?;
        }
        Ok(())
    })
    .await
    .context("Stage task panicked")?
}
