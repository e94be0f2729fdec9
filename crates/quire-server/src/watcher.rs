//! File watching for rebuilds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Quiet period that ends a batch of changes.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// A source change, classified by the stage that handles it.
///
/// Paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchEvent {
    /// Sass source
    StyleChanged(PathBuf),

    /// Anything under the elements directory
    ElementsChanged(PathBuf),

    /// Script outside the elements
    ScriptChanged(PathBuf),

    /// Markdown source or page template
    PageChanged(PathBuf),

    /// HTML copied into the output
    SiteFileChanged(PathBuf),

    /// Server code or config at the project root
    ServerFileChanged(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::StyleChanged(p)
            | WatchEvent::ElementsChanged(p)
            | WatchEvent::ScriptChanged(p)
            | WatchEvent::PageChanged(p)
            | WatchEvent::SiteFileChanged(p)
            | WatchEvent::ServerFileChanged(p) => p,
        }
    }
}

/// The project layout a watcher follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPaths {
    /// Project root, watched for server files
    pub root: PathBuf,

    /// Page source directory, watched recursively
    pub source_dir: PathBuf,

    /// Directory holding the bundled elements
    pub elements_dir: PathBuf,

    /// Page template
    pub template_path: PathBuf,
}

impl WatchPaths {
    /// The standard layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source_dir: root.join("app"),
            elements_dir: root.join("app/elements"),
            template_path: root.join("templates/page.template"),
            root,
        }
    }

    /// Classify a changed path.
    ///
    /// Returns `None` for paths outside the root and paths no stage cares
    /// about.
    pub fn classify(&self, path: &Path) -> Option<WatchEvent> {
        let relative = path.strip_prefix(&self.root).ok()?.to_path_buf();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if ext == "scss" {
            Some(WatchEvent::StyleChanged(relative))
        } else if path.starts_with(&self.elements_dir) {
            Some(WatchEvent::ElementsChanged(relative))
        } else if ext == "js" {
            Some(WatchEvent::ScriptChanged(relative))
        } else if (ext == "md" && path.starts_with(&self.source_dir)) || path == self.template_path
        {
            Some(WatchEvent::PageChanged(relative))
        } else if ext == "html" {
            Some(WatchEvent::SiteFileChanged(relative))
        } else if path.parent() == Some(self.root.as_path())
            && matches!(ext, "py" | "yaml" | "yml")
        {
            Some(WatchEvent::ServerFileChanged(relative))
        } else {
            None
        }
    }

    /// The same layout with the root canonicalized.
    ///
    /// Watcher events carry canonical paths, so every other path is moved
    /// under the canonical root too.
    fn canonicalize(&self) -> std::io::Result<Self> {
        let root = self.root.canonicalize()?;
        let resolve = |path: &Path| match path.canonicalize() {
            Ok(path) => path,
            Err(_) => match path.strip_prefix(&self.root) {
                Ok(relative) => root.join(relative),
                Err(_) => path.to_path_buf(),
            },
        };

        Ok(Self {
            source_dir: resolve(&self.source_dir),
            elements_dir: resolve(&self.elements_dir),
            template_path: resolve(&self.template_path),
            root,
        })
    }

    /// Directories watched recursively, skipping any nested in another.
    fn recursive_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        let template_dir = self.template_path.parent().map(Path::to_path_buf);

        for dir in [Some(self.source_dir.clone()), Some(self.elements_dir.clone()), template_dir]
            .into_iter()
            .flatten()
        {
            if dir == self.root || !dir.is_dir() || dirs.iter().any(|d| dir.starts_with(d)) {
                continue;
            }
            dirs.push(dir);
        }
        dirs
    }
}

/// Watches the project tree and emits debounced batches of changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the source and template directories recursively and the
    /// project root itself.
    ///
    /// Returns the watcher and a channel of change batches. Dropping the
    /// watcher closes the channel.
    pub fn new(
        paths: &WatchPaths,
    ) -> Result<(Self, async_mpsc::Receiver<Vec<WatchEvent>>), std::io::Error> {
        let paths = paths.canonicalize()?;
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(16);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(&paths.root, RecursiveMode::NonRecursive)
            .map_err(std::io::Error::other)?;
        for dir in paths.recursive_dirs() {
            watcher
                .watch(&dir, RecursiveMode::Recursive)
                .map_err(std::io::Error::other)?;
            tracing::debug!("Watching {}", dir.display());
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut changed = BTreeSet::new();
                collect(&paths, first, &mut changed);

                // Keep absorbing until the tree has been quiet for a while
                while let Ok(event) = sync_rx.recv_timeout(DEBOUNCE) {
                    collect(&paths, event, &mut changed);
                }

                if changed.is_empty() {
                    continue;
                }
                if async_tx.blocking_send(changed.into_iter().collect()).is_err() {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

fn collect(paths: &WatchPaths, event: notify::Event, into: &mut BTreeSet<WatchEvent>) {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return;
    }

    into.extend(event.paths.iter().filter_map(|path| paths.classify(path)));
}
