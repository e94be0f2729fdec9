//! Stylesheet pipeline: Sass compilation, prefixing and minification.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use quire_md::highlight::{theme_css, DEFAULT_THEME};

use crate::error::BuildError;
use crate::output::{files_with_extensions, write_atomic};

/// Configuration for the stylesheet stage.
#[derive(Debug, Clone)]
pub struct StyleConfig {
    /// Directory of `.scss` sources
    pub source_dir: PathBuf,

    /// Output directory for compiled CSS
    pub output_dir: PathBuf,

    /// Browserslist queries used for vendor prefixes
    pub browsers: Vec<String>,

    /// Organization named in the license banner
    pub license: Option<String>,

    /// Minify output
    pub minify: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("app/sass"),
            output_dir: PathBuf::from("dist/css"),
            browsers: ["last 2 versions", "ios 8", "Safari 8"]
                .into_iter()
                .map(String::from)
                .collect(),
            license: None,
            minify: true,
        }
    }
}

/// Id of the generated highlighting style module.
pub const SYNTAX_MODULE_ID: &str = "syntax-color";

/// Stylesheet pipeline.
pub struct AssetPipeline {
    config: StyleConfig,
}

impl AssetPipeline {
    pub fn new(config: StyleConfig) -> Self {
        Self { config }
    }

    /// Compile every non-partial `.scss` file. Returns the number written.
    pub fn build_styles(&self) -> Result<usize, BuildError> {
        let root = &self.config.source_dir;
        if !root.exists() {
            tracing::debug!("No stylesheet directory at {}", root.display());
            return Ok(0);
        }

        let sources: Vec<PathBuf> = files_with_extensions(root, &["scss"])?
            .into_iter()
            .filter(|p| !is_partial(p))
            .collect();

        for relative in &sources {
            let css = self.compile_file(&root.join(relative))?;
            let destination = self.config.output_dir.join(relative.with_extension("css"));
            write_atomic(&destination, css)?;
            tracing::debug!("Compiled {}", relative.display());
        }

        Ok(sources.len())
    }

    /// Compile one Sass file to prefixed, banner-stamped CSS.
    pub fn compile_file(&self, path: &Path) -> Result<String, BuildError> {
        let options = grass::Options::default().load_path(&self.config.source_dir);
        let css = grass::from_path(path, &options).map_err(|e| BuildError::Style {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let css = Self::process_css(&css, &self.config.browsers, self.config.minify).map_err(
            |message| BuildError::Style {
                path: path.to_path_buf(),
                message,
            },
        )?;

        Ok(self.with_banner(css))
    }

    /// Write the highlighting stylesheet as a Polymer style module.
    pub fn build_syntax_module(&self) -> Result<PathBuf, BuildError> {
        let destination = self.config.output_dir.join(format!("{}.html", SYNTAX_MODULE_ID));

        let css = theme_css(DEFAULT_THEME).map_err(|e| BuildError::Style {
            path: destination.clone(),
            message: e.to_string(),
        })?;
        let css = Self::process_css(&css, &self.config.browsers, false).map_err(|message| {
            BuildError::Style {
                path: destination.clone(),
                message,
            }
        })?;

        write_atomic(&destination, style_module(SYNTAX_MODULE_ID, &css))?;
        Ok(destination)
    }

    /// Add vendor prefixes for `browsers` and optionally minify.
    pub fn process_css(css: &str, browsers: &[String], minify: bool) -> Result<String, String> {
        let browsers = if browsers.is_empty() {
            None
        } else {
            Browsers::from_browserslist(browsers.iter().map(String::as_str))
                .map_err(|e| format!("Invalid browser query: {}", e))?
        };
        let targets = Targets {
            browsers,
            ..Targets::default()
        };

        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions {
                targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify,
                targets,
                ..Default::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?;

        Ok(printed.code)
    }

    fn with_banner(&self, body: String) -> String {
        match &self.config.license {
            Some(org) => format!("{}{}", license_banner(org), body),
            None => body,
        }
    }
}

/// Sass partials are only compiled through imports.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Compact BSD-2 license banner.
pub fn license_banner(organization: &str) -> String {
    format!("/*! @license Copyright (c) {} | BSD-2-Clause */\n", organization)
}

/// Wrap CSS in a `<dom-module>` so elements can include it by id.
pub fn style_module(id: &str, css: &str) -> String {
    format!(
        "<dom-module id=\"{}\"><template><style>\n{}\n</style></template></dom-module>\n",
        id,
        css.trim_end()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pipeline(root: &Path) -> AssetPipeline {
        AssetPipeline::new(StyleConfig {
            source_dir: root.join("sass"),
            output_dir: root.join("dist/css"),
            license: Some("The Authors".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn compiles_sass_with_partials() {
        let temp = tempdir().unwrap();
        let sass = temp.path().join("sass");
        fs::create_dir_all(sass.join("pages")).unwrap();
        fs::write(sass.join("_vars.scss"), "$accent: #ff0000;").unwrap();
        fs::write(
            sass.join("main.scss"),
            "@import 'vars';\n.button {\n  .label { color: $accent; }\n}\n",
        )
        .unwrap();
        fs::write(sass.join("pages/home.scss"), ".home { margin: 0 auto; }").unwrap();

        let written = pipeline(temp.path()).build_styles().unwrap();

        assert_eq!(written, 2);
        let css = fs::read_to_string(temp.path().join("dist/css/main.css")).unwrap();
        assert!(css.starts_with("/*! @license Copyright (c) The Authors | BSD-2-Clause */\n"));
        assert!(css.contains(".button .label{color:red}"));
        assert!(temp.path().join("dist/css/pages/home.css").exists());
        assert!(!temp.path().join("dist/css/_vars.css").exists());
    }

    #[test]
    fn adds_vendor_prefixes() {
        let css = AssetPipeline::process_css(
            ".a { user-select: none; }",
            &["Safari 8".to_string()],
            true,
        )
        .unwrap();

        assert!(css.contains("-webkit-user-select:none"));
    }

    #[test]
    fn minifies_css() {
        let css = r#"
.button {
    background-color: blue;
    padding: 10px;
}
        "#;

        let minified = AssetPipeline::process_css(css, &[], true).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".button"));
    }

    #[test]
    fn reports_sass_errors_with_path() {
        let temp = tempdir().unwrap();
        let sass = temp.path().join("sass");
        fs::create_dir_all(&sass).unwrap();
        fs::write(sass.join("broken.scss"), ".a { color: $undefined; }").unwrap();

        let err = pipeline(temp.path()).build_styles().unwrap_err();

        assert!(matches!(err, BuildError::Style { ref path, .. } if path.ends_with("broken.scss")));
    }

    #[test]
    fn writes_syntax_style_module() {
        let temp = tempdir().unwrap();

        let path = pipeline(temp.path()).build_syntax_module().unwrap();

        let html = fs::read_to_string(path).unwrap();
        assert!(html.starts_with("<dom-module id=\"syntax-color\"><template><style>"));
        assert!(html.ends_with("</style></template></dom-module>\n"));
    }

    #[test]
    fn missing_source_dir_builds_nothing() {
        let temp = tempdir().unwrap();

        assert_eq!(pipeline(temp.path()).build_styles().unwrap(), 0);
    }
}
