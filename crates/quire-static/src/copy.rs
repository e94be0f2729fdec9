//! Copying site files into the output and cleaning it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::BuildError;
use crate::output::{copy_file, has_extension};

/// One source path copied into the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CopyRule {
    /// File or directory, relative to the project root
    pub from: PathBuf,

    /// Destination, relative to the output directory
    pub to: PathBuf,

    /// Only copy files with these extensions (all when empty)
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Only copy files whose name starts with this prefix
    #[serde(default)]
    pub prefix: Option<String>,

    /// File or directory names never copied
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Descend into subdirectories
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

impl CopyRule {
    /// Copy `from` to `to` recursively with no filters.
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            extensions: Vec::new(),
            prefix: None,
            exclude: Vec::new(),
            recursive: true,
        }
    }

    /// The standard site layout.
    ///
    /// `config_file` is left out of the top-level files along with the
    /// project readme and package manifest.
    pub fn defaults(config_file: &str) -> Vec<Self> {
        vec![
            Self {
                recursive: false,
                exclude: vec![
                    "README.md".to_string(),
                    "package.json".to_string(),
                    config_file.to_string(),
                ],
                ..Self::new(".", ".")
            },
            Self::new("app/manifest.json", "manifest.json"),
            Self {
                extensions: vec!["html".to_string()],
                exclude: vec!["elements".to_string()],
                ..Self::new("app", ".")
            },
            Self::new("templates", "templates"),
            Self::new("lib", "lib"),
            Self::new("tests", "tests"),
            Self {
                extensions: vec!["js".to_string()],
                prefix: Some("webcomponents".to_string()),
                recursive: false,
                ..Self::new(
                    "app/bower_components/webcomponentsjs",
                    "bower_components/webcomponentsjs",
                )
            },
        ]
    }

    /// Whether the file at `relative` (to the rule source) is copied.
    fn accepts(&self, relative: &Path) -> bool {
        let name = relative.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();

        has_extension(relative, &extensions)
            && self.prefix.as_deref().is_none_or(|p| name.starts_with(p))
            && !relative
                .iter()
                .any(|part| self.exclude.iter().any(|e| part == e.as_str()))
    }

    /// Files matched by this rule as `(source, destination)` pairs.
    fn plan(
        &self,
        root: &Path,
        output_dir: &Path,
    ) -> Result<Vec<(PathBuf, PathBuf)>, BuildError> {
        let source = root.join(&self.from);
        let dest = output_dir.join(&self.to);

        if source.is_file() {
            let name = source.file_name().map(Path::new).unwrap_or(Path::new(""));
            return Ok(if self.accepts(name) {
                vec![(source, dest)]
            } else {
                Vec::new()
            });
        }

        if !source.is_dir() {
            tracing::debug!("Nothing to copy at {}", source.display());
            return Ok(Vec::new());
        }

        let depth = if self.recursive { usize::MAX } else { 1 };
        let mut plan = Vec::new();
        for entry in WalkDir::new(&source).max_depth(depth).sort_by_file_name() {
            let entry = entry.map_err(BuildError::walk(&source))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&source) {
                if self.accepts(relative) {
                    plan.push((entry.path().to_path_buf(), dest.join(relative)));
                }
            }
        }
        Ok(plan)
    }
}

/// Apply every rule. Returns the number of files copied.
pub fn copy_rules(
    root: &Path,
    output_dir: &Path,
    rules: &[CopyRule],
) -> Result<usize, BuildError> {
    let mut copied = 0;

    for rule in rules {
        let plan = rule.plan(root, output_dir)?;
        for (from, to) in &plan {
            copy_file(from, to)?;
        }
        tracing::debug!("Copied {} file(s) from {}", plan.len(), rule.from.display());
        copied += plan.len();
    }

    Ok(copied)
}

/// Remove each path that exists.
pub fn clean(paths: &[PathBuf]) -> Result<(), BuildError> {
    for path in paths {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else if path.exists() {
            fs::remove_file(path)
        } else {
            continue;
        };
        result.map_err(BuildError::write(path))?;
        tracing::debug!("Removed {}", path.display());
    }
    Ok(())
}
