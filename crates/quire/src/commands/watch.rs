//! Watch command: rebuild on change while serving the output.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use quire_server::{
    DevServer, DevServerConfig, FileWatcher, LiveNotifier, NoopNotifier, Notifier, ReloadHub,
    WatchEvent, WatchPaths,
};
use quire_static::{Site, SiteConfig, Stage};

/// Stages that bring the output up to date with `events`, in run order.
pub fn stages_for(events: &[WatchEvent]) -> Vec<Stage> {
    let stages: BTreeSet<Stage> = events
        .iter()
        .flat_map(|event| match event {
            WatchEvent::StyleChanged(_) => vec![Stage::Style],
            WatchEvent::ElementsChanged(_) => vec![Stage::Lint, Stage::Bundle],
            WatchEvent::ScriptChanged(_) => vec![Stage::Lint],
            WatchEvent::PageChanged(_) => vec![Stage::Pages],
            WatchEvent::SiteFileChanged(_) | WatchEvent::ServerFileChanged(_) => {
                vec![Stage::Copy]
            }
        })
        .collect();

    stages.into_iter().collect()
}

/// The layout the watcher follows for `config`.
pub fn watch_paths(config: &SiteConfig) -> WatchPaths {
    WatchPaths {
        root: config.root.clone(),
        source_dir: config.pages.source_dir.clone(),
        elements_dir: config
            .bundle
            .entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.pages.source_dir.join("elements")),
        template_path: config.pages.template_path.clone(),
    }
}

/// Run the watch command.
pub async fn run(mut config: SiteConfig, reload: bool, open: bool, port: u16) -> Result<()> {
    // Lint problems are reported but never stop a rebuild
    config.fail_on_lint = false;

    let paths = watch_paths(&config);
    let output = config.output_dir.clone();
    let site = Arc::new(Site::new(config));

    let initial = Arc::clone(&site);
    match tokio::task::spawn_blocking(move || initial.build())
        .await
        .context("Build task panicked")?
    {
        Ok(report) => tracing::info!(
            "Built {} pages in {}ms",
            report.pages,
            report.duration_ms
        ),
        Err(e) => tracing::error!("Initial build failed: {}", e),
    }

    let hub = ReloadHub::new();
    let notifier: Arc<dyn Notifier> = if reload {
        Arc::new(LiveNotifier::new(hub.clone()))
    } else {
        Arc::new(NoopNotifier)
    };

    let (watcher, mut rx) = FileWatcher::new(&paths)
        .with_context(|| format!("Failed to watch {}", paths.root.display()))?;

    tokio::spawn(async move {
        while let Some(events) = rx.recv().await {
            let stages = stages_for(&events);
            let changed: Vec<PathBuf> = events.iter().map(|e| e.path().to_path_buf()).collect();

            for path in &changed {
                tracing::info!("Changed: {}", path.display());
            }

            let site = Arc::clone(&site);
            let result = tokio::task::spawn_blocking(move || {
                stages.iter().try_for_each(|stage| site.run(*stage))
            })
            .await;

            match result {
                Ok(Ok(())) => notifier.reload(&changed),
                Ok(Err(e)) => tracing::error!("Rebuild failed: {}", e),
                Err(e) => tracing::error!("Rebuild task panicked: {}", e),
            }
        }
        // Keep watcher alive
        drop(watcher);
    });

    let server = DevServerConfig {
        root: output,
        port,
        open,
        reload,
        ..Default::default()
    };

    DevServer::new(server, hub).start().await?;

    Ok(())
}
