//! Build errors.

use std::io;
use std::path::{Path, PathBuf};

/// Errors that can occur during a build stage.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source directory not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("Failed to load template {}: {source}", path.display())]
    TemplateMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render template: {0}")]
    Template(String),

    #[error("Invalid front matter in {}: {message}", path.display())]
    FrontMatter { path: PathBuf, message: String },

    #[error("Failed to compile stylesheet {}: {message}", path.display())]
    Style { path: PathBuf, message: String },

    #[error("Failed to minify script {}: {message}", path.display())]
    Script { path: PathBuf, message: String },

    #[error("Failed to optimize image {}: {message}", path.display())]
    Image { path: PathBuf, message: String },

    #[error("{}: import not found: {href}", path.display())]
    Import { path: PathBuf, href: String },

    #[error("Lint failed with {0} problem(s)")]
    Lint(usize),
}

impl BuildError {
    pub(crate) fn read(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Read { path, source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Write { path, source }
    }

    /// A failed directory walk under `root`, naming the entry that failed.
    pub(crate) fn walk(root: &Path) -> impl FnOnce(walkdir::Error) -> Self + '_ {
        move |e| Self::Read {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        }
    }
}

impl From<minijinja::Error> for BuildError {
    fn from(e: minijinja::Error) -> Self {
        Self::Template(e.to_string())
    }
}
