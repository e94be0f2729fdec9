//! Build stages and their sequencing.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use rayon::prelude::*;

use crate::assets::{AssetPipeline, StyleConfig};
use crate::bundle::{build_bundle, BundleConfig};
use crate::copy::{clean, copy_rules, CopyRule};
use crate::error::BuildError;
use crate::images::{build_images, ImageConfig, ImageOptimizer, Passthrough};
use crate::pages::{PageGenerator, PagesConfig};
use crate::scripts::{build_scripts, lint, LintReport, ScriptConfig};

/// Configuration for every stage of a site build.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Project root; copy rules are relative to it
    pub root: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Paths removed by the clean stage
    pub clean_paths: Vec<PathBuf>,

    /// Fail when the lint stage reports problems
    pub fail_on_lint: bool,

    pub pages: PagesConfig,
    pub style: StyleConfig,
    pub images: ImageConfig,
    pub scripts: ScriptConfig,
    pub bundle: BundleConfig,
    pub copy: Vec<CopyRule>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_dir: PathBuf::from("dist"),
            clean_paths: vec![PathBuf::from("dist"), PathBuf::from("app/css")],
            fail_on_lint: true,
            pages: PagesConfig::default(),
            style: StyleConfig::default(),
            images: ImageConfig::default(),
            scripts: ScriptConfig::default(),
            bundle: BundleConfig::default(),
            copy: CopyRule::defaults("quire.toml"),
        }
    }
}

/// A single build stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Clean,
    Lint,
    Style,
    StyleModules,
    Images,
    Scripts,
    Bundle,
    Copy,
    Pages,
}

impl Stage {
    /// Stages that run concurrently between lint and copy.
    pub const ASSETS: [Stage; 5] = [
        Stage::Style,
        Stage::StyleModules,
        Stage::Images,
        Stage::Bundle,
        Stage::Scripts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Lint => "lint",
            Stage::Style => "style",
            Stage::StyleModules => "style-modules",
            Stage::Images => "images",
            Stage::Scripts => "js",
            Stage::Bundle => "bundle",
            Stage::Copy => "copy",
            Stage::Pages => "pages",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of pages written
    pub pages: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// A site and the stages that build it.
pub struct Site {
    config: SiteConfig,
    styles: AssetPipeline,
    pages: PageGenerator,
    optimizer: Box<dyn ImageOptimizer>,
}

impl Site {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            styles: AssetPipeline::new(config.style.clone()),
            pages: PageGenerator::new(config.pages.clone()),
            optimizer: Box::new(Passthrough),
            config,
        }
    }

    /// Use `optimizer` for the image stage.
    pub fn with_optimizer(mut self, optimizer: impl ImageOptimizer + 'static) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Lint scripts and log the report.
    pub fn lint(&self) -> Result<LintReport, BuildError> {
        let report = lint(&self.config.scripts.lint_roots)?;
        report.report();
        Ok(report)
    }

    /// Run one stage.
    pub fn run(&self, stage: Stage) -> Result<(), BuildError> {
        let start = Instant::now();

        match stage {
            Stage::Clean => clean(&self.config.clean_paths)?,
            Stage::Lint => {
                let report = self.lint()?;
                if !report.is_clean() && self.config.fail_on_lint {
                    return Err(BuildError::Lint(report.diagnostics.len()));
                }
            }
            Stage::Style => {
                let written = self.styles.build_styles()?;
                tracing::info!("Compiled {} stylesheet(s)", written);
            }
            Stage::StyleModules => {
                let path = self.styles.build_syntax_module()?;
                tracing::info!("Wrote {}", path.display());
            }
            Stage::Images => {
                let result = build_images(&self.config.images, self.optimizer.as_ref())?;
                tracing::info!(
                    "Images: {} written, {} unchanged",
                    result.written,
                    result.skipped
                );
            }
            Stage::Scripts => {
                let written = build_scripts(&self.config.scripts)?;
                tracing::info!("Minified {} script(s)", written);
            }
            Stage::Bundle => {
                if !self.config.bundle.entry.exists() {
                    tracing::debug!(
                        "No bundle entry at {}",
                        self.config.bundle.entry.display()
                    );
                    return Ok(());
                }
                let (html, _) = build_bundle(&self.config.bundle)?;
                tracing::info!("Bundled {}", html.display());
            }
            Stage::Copy => {
                let copied =
                    copy_rules(&self.config.root, &self.config.output_dir, &self.config.copy)?;
                tracing::info!("Copied {} file(s)", copied);
            }
            Stage::Pages => {
                let result = self.pages.build()?;
                tracing::info!("Generated {} page(s)", result.pages);
            }
        }

        tracing::debug!(
            "Stage {} finished in {}ms",
            stage,
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Run the full build: clean, lint, the asset stages in parallel, copy, pages.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        self.run(Stage::Clean)?;
        self.run(Stage::Lint)?;

        Stage::ASSETS
            .par_iter()
            .map(|stage| self.run(*stage))
            .collect::<Result<Vec<()>, BuildError>>()?;

        self.run(Stage::Copy)?;

        let pages = self.pages.build()?;
        tracing::info!("Generated {} page(s)", pages.pages);

        Ok(BuildReport {
            pages: pages.pages,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(root: &Path) -> SiteConfig {
        let dist = root.join("dist");
        let app = root.join("app");
        SiteConfig {
            root: root.to_path_buf(),
            output_dir: dist.clone(),
            clean_paths: vec![dist.clone(), app.join("css")],
            fail_on_lint: true,
            pages: PagesConfig {
                source_dir: app.clone(),
                output_dir: dist.clone(),
                template_path: root.join("templates/page.template"),
                ..PagesConfig::default()
            },
            style: StyleConfig {
                source_dir: app.join("sass"),
                output_dir: dist.join("css"),
                ..StyleConfig::default()
            },
            images: ImageConfig {
                source_dir: app.join("images"),
                output_dir: dist.join("images"),
            },
            scripts: ScriptConfig {
                source_dir: app.join("js"),
                output_dir: dist.join("js"),
                lint_roots: vec![app.join("js"), app.join("elements")],
                license: None,
            },
            bundle: BundleConfig {
                entry: app.join("elements/elements.html"),
                output_dir: dist.join("elements"),
                license: None,
                minify: false,
            },
            copy: CopyRule::defaults("quire.toml"),
        }
    }

    fn site_tree(root: &Path) {
        write(root, "templates/page.template", "<title><%= title %></title><%= content %>");
        write(root, "app/index.md", "---\ntitle: Home\n---\n# Welcome\n");
        write(root, "app/sass/main.scss", ".a { .b { color: red; } }");
        write(root, "app/js/app.js", "window.app = { ready: true };");
        write(root, "app/images/logo.svg", "<svg/>");
        write(
            root,
            "app/elements/elements.html",
            "<dom-module id=\"x-a\"></dom-module><script>window.xa = 1;</script>",
        );
        write(root, "app.yaml", "runtime: python27");
    }

    #[test]
    fn full_build_writes_every_output() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        site_tree(root);
        write(root, "dist/stale.html", "old");

        let report = Site::new(config(root)).build().unwrap();

        assert_eq!(report.pages, 1);
        let dist = root.join("dist");
        assert!(!dist.join("stale.html").exists());
        for file in [
            "index.html",
            "css/main.css",
            "css/syntax-color.html",
            "js/app.js",
            "images/logo.svg",
            "elements/elements.html",
            "elements/elements.js",
            "app.yaml",
            "templates/page.template",
        ] {
            assert!(dist.join(file).exists(), "missing {file}");
        }
        let index = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(index.starts_with("<title>Home</title>"));
    }

    #[test]
    fn dirty_lint_fails_build() {
        let temp = tempdir().unwrap();
        site_tree(temp.path());
        write(temp.path(), "app/js/broken.js", "function (");

        let err = Site::new(config(temp.path())).build().unwrap_err();

        assert!(matches!(err, BuildError::Lint(n) if n > 0));
        assert!(!temp.path().join("dist/index.html").exists());
    }

    #[test]
    fn lint_failure_can_be_tolerated() {
        let temp = tempdir().unwrap();
        site_tree(temp.path());
        write(temp.path(), "app/js/broken.js", "function (");
        let mut config = config(temp.path());
        config.fail_on_lint = false;

        Site::new(config).run(Stage::Lint).unwrap();
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::StyleModules.to_string(), "style-modules");
        assert_eq!(Stage::Scripts.name(), "js");
    }
}
