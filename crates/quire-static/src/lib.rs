//! Build stages for quire sites.
//!
//! Each stage reads from the project tree and writes into the output
//! directory. [`Site`] runs them individually or as the full build.

pub mod assets;
pub mod bundle;
pub mod copy;
pub mod error;
pub mod images;
pub mod output;
pub mod pages;
pub mod scripts;
pub mod site;
pub mod templates;

pub use assets::{license_banner, style_module, AssetPipeline, StyleConfig};
pub use bundle::{build_bundle, crisper, vulcanize, Bundle, BundleConfig};
pub use copy::{clean, copy_rules, CopyRule};
pub use error::BuildError;
pub use images::{build_images, ImageConfig, ImageOptimizer, ImagesResult, Passthrough};
pub use pages::{output_path, PageGenerator, PagesConfig, PagesResult, RenderedPage};
pub use scripts::{build_scripts, lint, minify_js, Diagnostic, LintReport, ScriptConfig};
pub use site::{BuildReport, Site, SiteConfig, Stage};
pub use templates::{PageTemplate, TemplateData};
