//! JavaScript linting and minification.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

use crate::assets::license_banner;
use crate::error::BuildError;
use crate::output::{files_with_extensions, write_atomic};

/// Configuration for the script stages.
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Scripts to minify
    pub source_dir: PathBuf,

    /// Output directory for minified scripts
    pub output_dir: PathBuf,

    /// Directories whose `.js` files and inline `<script>`s are linted
    pub lint_roots: Vec<PathBuf>,

    /// Organization named in the license banner
    pub license: Option<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("app/js"),
            output_dir: PathBuf::from("dist/js"),
            lint_roots: vec![PathBuf::from("app/js"), PathBuf::from("app/elements")],
            license: None,
        }
    }
}

/// A lint problem in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of a lint run.
#[derive(Debug, Default)]
pub struct LintReport {
    /// Number of files checked
    pub files: usize,

    /// Problems found
    pub diagnostics: Vec<Diagnostic>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Log every diagnostic at warn level.
    pub fn report(&self) {
        for d in &self.diagnostics {
            tracing::warn!("{}: {}", d.path.display(), d.message);
        }
        if self.is_clean() {
            tracing::info!("Linted {} files, no problems", self.files);
        } else {
            tracing::warn!(
                "Linted {} files, {} problem(s)",
                self.files,
                self.diagnostics.len()
            );
        }
    }
}

pub(crate) fn inline_script_re() -> &'static Regex {
    static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
    SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("valid script regex")
    })
}

/// Bodies of inline `<script>` elements in an HTML document.
///
/// Scripts with a `src` attribute or a non-JavaScript `type` are skipped.
pub fn extract_scripts(html: &str) -> Vec<String> {
    inline_script_re()
        .captures_iter(html)
        .filter(|caps| is_inline_javascript(&caps[1]))
        .map(|caps| caps[2].to_string())
        .filter(|body| !body.trim().is_empty())
        .collect()
}

pub(crate) fn is_inline_javascript(attrs: &str) -> bool {
    let attrs = attrs.to_ascii_lowercase();
    if attrs.contains("src=") {
        return false;
    }
    match attrs.find("type=") {
        Some(pos) => {
            let value = attrs[pos + 5..].trim_start_matches(['"', '\'']);
            value.starts_with("text/javascript")
                || value.starts_with("module")
                || value.starts_with("application/javascript")
        }
        None => true,
    }
}

/// Parse `source` and return its syntax errors.
pub fn lint_source(path: &Path, source: &str) -> Vec<Diagnostic> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    ret.errors
        .iter()
        .map(|e| Diagnostic {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
        .collect()
}

/// Lint every `.js` file and every inline script in `.html` files under `roots`.
pub fn lint(roots: &[PathBuf]) -> Result<LintReport, BuildError> {
    let mut report = LintReport::default();

    for root in roots.iter().filter(|r| r.exists()) {
        for relative in files_with_extensions(root, &["js", "html"])? {
            let path = root.join(&relative);
            let source = fs::read_to_string(&path).map_err(BuildError::read(&path))?;

            if relative.extension().is_some_and(|e| e == "html") {
                for script in extract_scripts(&source) {
                    report.diagnostics.extend(lint_source(&path, &script));
                }
            } else {
                report.diagnostics.extend(lint_source(&path, &source));
            }
            report.files += 1;
        }
    }

    Ok(report)
}

/// Minify JavaScript.
pub fn minify_js(source: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();

    let ret = Parser::new(&allocator, source, source_type).parse();

    if !ret.errors.is_empty() {
        return Err(format!(
            "Failed to parse JavaScript: {}",
            ret.errors
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let mut program = ret.program;

    let minifier = Minifier::new(MinifierOptions {
        compress: Some(CompressOptions::default()),
        mangle: Some(MangleOptions::default()),
    });
    minifier.minify(&allocator, &mut program);

    let printed = Codegen::new()
        .with_options(CodegenOptions::minify())
        .build(&program);

    Ok(printed.code)
}

/// Minify every script under the source directory. Returns the number written.
pub fn build_scripts(config: &ScriptConfig) -> Result<usize, BuildError> {
    let root = &config.source_dir;
    if !root.exists() {
        tracing::debug!("No script directory at {}", root.display());
        return Ok(0);
    }

    let sources = files_with_extensions(root, &["js"])?;

    for relative in &sources {
        let path = root.join(relative);
        let source = fs::read_to_string(&path).map_err(BuildError::read(&path))?;

        let minified = minify_js(&source).map_err(|message| BuildError::Script {
            path: path.clone(),
            message,
        })?;

        let output = match &config.license {
            Some(org) => format!("{}{}", license_banner(org), minified),
            None => minified,
        };
        write_atomic(&config.output_dir.join(relative), output)?;
    }

    Ok(sources.len())
}
