//! Image stage.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::BuildError;
use crate::output::{files_with_extensions, is_up_to_date, write_atomic};

/// Optimizes image bytes, keeping the format.
pub trait ImageOptimizer: Send + Sync {
    /// Return optimized bytes for the image at `path`.
    fn optimize(&self, path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// Leaves images unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ImageOptimizer for Passthrough {
    fn optimize(&self, _path: &Path, bytes: Vec<u8>) -> Result<Vec<u8>, String> {
        Ok(bytes)
    }
}

/// Configuration for the image stage.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("app/images"),
            output_dir: PathBuf::from("dist/images"),
        }
    }
}

/// Result of the image stage.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImagesResult {
    /// Images written
    pub written: usize,
    /// Images skipped because the output was current
    pub skipped: usize,
}

/// Optimize every changed image into the output directory.
pub fn build_images(
    config: &ImageConfig,
    optimizer: &dyn ImageOptimizer,
) -> Result<ImagesResult, BuildError> {
    let root = &config.source_dir;
    if !root.exists() {
        tracing::debug!("No image directory at {}", root.display());
        return Ok(ImagesResult::default());
    }

    let outcomes: Vec<Result<bool, BuildError>> = files_with_extensions(root, &[])?
        .par_iter()
        .map(|relative| {
            let src = root.join(relative);
            let dest = config.output_dir.join(relative);
            if is_up_to_date(&src, &dest) {
                return Ok(false);
            }

            let bytes = fs::read(&src).map_err(BuildError::read(&src))?;
            let optimized = optimizer.optimize(&src, bytes).map_err(|message| BuildError::Image {
                path: src.clone(),
                message,
            })?;
            write_atomic(&dest, optimized)?;
            Ok(true)
        })
        .collect();

    let mut result = ImagesResult::default();
    for outcome in outcomes {
        if outcome? {
            result.written += 1;
        } else {
            result.skipped += 1;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct Truncate;

    impl ImageOptimizer for Truncate {
        fn optimize(&self, _path: &Path, mut bytes: Vec<u8>) -> Result<Vec<u8>, String> {
            bytes.truncate(1);
            Ok(bytes)
        }
    }

    #[test]
    fn copies_changed_images_only() {
        let temp = tempdir().unwrap();
        let config = ImageConfig {
            source_dir: temp.path().join("images"),
            output_dir: temp.path().join("dist/images"),
        };
        fs::create_dir_all(config.source_dir.join("icons")).unwrap();
        fs::write(config.source_dir.join("logo.png"), [1u8, 2, 3]).unwrap();
        fs::write(config.source_dir.join("icons/a.svg"), "<svg/>").unwrap();

        let first = build_images(&config, &Passthrough).unwrap();
        assert_eq!(first, ImagesResult { written: 2, skipped: 0 });
        assert_eq!(fs::read(config.output_dir.join("logo.png")).unwrap(), vec![1, 2, 3]);

        let second = build_images(&config, &Passthrough).unwrap();
        assert_eq!(second, ImagesResult { written: 0, skipped: 2 });
    }

    #[test]
    fn applies_optimizer() {
        let temp = tempdir().unwrap();
        let config = ImageConfig {
            source_dir: temp.path().join("images"),
            output_dir: temp.path().join("out"),
        };
        fs::create_dir_all(&config.source_dir).unwrap();
        fs::write(config.source_dir.join("big.png"), [9u8; 16]).unwrap();

        build_images(&config, &Truncate).unwrap();

        assert_eq!(fs::read(config.output_dir.join("big.png")).unwrap(), vec![9]);
    }
}
