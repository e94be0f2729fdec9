//! Page generation: Markdown sources to templated HTML.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use minijinja::Value;
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use quire_md::{annotate_headings, insert_toc, render_markdown, toc_block, Document, Highlighter, TocEntry};

use crate::error::BuildError;
use crate::output::write_atomic;
use crate::templates::{PageTemplate, TemplateData};

/// Configuration for page generation.
#[derive(Debug, Clone)]
pub struct PagesConfig {
    /// Source root
    pub source_dir: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Page template
    pub template_path: PathBuf,

    /// Extension of source documents
    pub extension: String,

    /// Top-level directories under the source root that are never read
    pub exclude: Vec<String>,

    /// Deepest heading level that gets an anchor and a TOC entry
    pub toc_max: u8,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("app"),
            output_dir: PathBuf::from("dist"),
            template_path: PathBuf::from("templates/page.template"),
            extension: "md".to_string(),
            exclude: ["bower_components", "elements", "images", "js", "sass"]
                .into_iter()
                .map(String::from)
                .collect(),
            toc_max: 3,
        }
    }
}

/// A document rendered to HTML, ready for templating.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Body HTML with anchored headings
    pub html: String,

    /// Anchored headings in document order
    pub table_of_contents: Vec<TocEntry>,

    /// `title` from the front matter, or empty
    pub title: String,

    /// `link` from the front matter, or empty
    pub link: String,

    /// Output path relative to the output root
    pub output_path: PathBuf,
}

impl RenderedPage {
    /// The collapsible TOC block.
    pub fn toc_html(&self) -> String {
        toc_block(&self.table_of_contents)
    }

    /// Page content: anchored HTML with the TOC block in place.
    pub fn content(&self) -> String {
        insert_toc(&self.html, &self.toc_html())
    }
}

/// Result of a page build.
#[derive(Debug)]
pub struct PagesResult {
    /// Number of pages written
    pub pages: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// Output path for a source path: same location, `.html` extension.
pub fn output_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("html")
}

/// Generates HTML pages from Markdown sources.
pub struct PageGenerator {
    config: PagesConfig,
    highlighter: Highlighter,
}

impl PageGenerator {
    /// Create a page generator with a fresh highlighter.
    pub fn new(config: PagesConfig) -> Self {
        Self {
            config,
            highlighter: Highlighter::new(),
        }
    }

    /// Build every page.
    ///
    /// The template is loaded before any document is read. A failing document
    /// does not stop the others; the first failure is returned once all
    /// documents have been attempted.
    pub fn build(&self) -> Result<PagesResult, BuildError> {
        let start = Instant::now();

        let template = PageTemplate::load(&self.config.template_path)?;
        let sources = self.discover()?;

        let results: Vec<Result<PathBuf, BuildError>> = sources
            .par_iter()
            .map(|source| self.build_page(source, &template))
            .collect();

        let mut pages = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(path) => {
                    tracing::debug!("Wrote {}", path.display());
                    pages += 1;
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(PagesResult {
            pages,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Find source documents, relative to the source root, in sorted order.
    pub fn discover(&self) -> Result<Vec<PathBuf>, BuildError> {
        let root = &self.config.source_dir;
        if !root.exists() {
            return Err(BuildError::MissingSource(root.clone()));
        }

        let mut sources = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = entry.map_err(BuildError::walk(root))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry.path().extension().and_then(OsStr::to_str)
                == Some(self.config.extension.as_str());
            if !matches {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(root) {
                sources.push(relative.to_path_buf());
            }
        }

        Ok(sources)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() == 1
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.config.exclude.iter().any(|ex| ex == name))
    }

    /// Render one document. Pure: no I/O.
    pub fn render(&self, doc: &Document) -> RenderedPage {
        let html = render_markdown(&doc.body, &self.highlighter);
        let annotated = annotate_headings(&html, self.config.toc_max);

        RenderedPage {
            html: annotated.html,
            table_of_contents: annotated.toc,
            title: doc.field("title"),
            link: doc.field("link"),
            output_path: output_path(&doc.source_path),
        }
    }

    /// Read, render, template and write one document.
    pub fn build_page(
        &self,
        source: &Path,
        template: &PageTemplate,
    ) -> Result<PathBuf, BuildError> {
        let source_file = self.config.source_dir.join(source);
        let raw = fs::read_to_string(&source_file).map_err(BuildError::read(&source_file))?;

        let doc = Document::parse(source, raw).map_err(|e| BuildError::FrontMatter {
            path: source_file.clone(),
            message: e.to_string(),
        })?;

        let page = self.render(&doc);
        let html = template.render(&template_data(&doc, &page))?;

        let destination = self.config.output_dir.join(&page.output_path);
        write_atomic(&destination, html)?;

        Ok(destination)
    }
}

/// Front matter fields overlaid with the computed page fields.
fn template_data(doc: &Document, page: &RenderedPage) -> TemplateData {
    let mut data: TemplateData = doc
        .front_matter
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
        .collect();

    let path = page
        .output_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    data.insert("title".to_string(), Value::from(page.title.clone()));
    data.insert("link".to_string(), Value::from(page.link.clone()));
    data.insert("content".to_string(), Value::from(page.content()));
    data.insert("toc".to_string(), Value::from(page.toc_html()));
    data.insert(
        "toc_entries".to_string(),
        Value::from_serialize(&page.table_of_contents),
    );
    data.insert("path".to_string(), Value::from(path));

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEMPLATE: &str = "<title><%= title %></title><main><%= content %></main>\n";

    struct Fixture {
        _temp: tempfile::TempDir,
        config: PagesConfig,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let temp = tempdir().unwrap();
        let source = temp.path().join("app");
        let output = temp.path().join("dist");
        let template = temp.path().join("page.template");

        fs::create_dir_all(&source).unwrap();
        fs::write(&template, TEMPLATE).unwrap();
        for (path, content) in files {
            let path = source.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let config = PagesConfig {
            source_dir: source,
            output_dir: output,
            template_path: template,
            ..Default::default()
        };

        Fixture {
            _temp: temp,
            config,
        }
    }

    #[test]
    fn builds_intro_page() {
        let fx = fixture(&[(
            "docs/intro.md",
            "---\ntitle: Intro\n---\n# Intro\n## Setup\nSome text.\n",
        )]);

        let result = PageGenerator::new(fx.config.clone()).build().unwrap();

        assert_eq!(result.pages, 1);
        let html = fs::read_to_string(fx.config.output_dir.join("docs/intro.html")).unwrap();
        assert!(html.starts_with("<title>Intro</title>"));
        assert!(html.contains("<h1 id=\"intro\" class=\"has-permalink\">Intro</h1>"));
        assert!(html.contains("<h2 id=\"setup\" class=\"has-permalink\">Setup</h2>"));

        let toc_start = html.find("<details id=\"toc\">").unwrap();
        let intro_link = html.find("<a href=\"#intro\">Intro</a>").unwrap();
        let setup_link = html.find("<a href=\"#setup\">Setup</a>").unwrap();
        assert!(toc_start < intro_link && intro_link < setup_link);
    }

    #[test]
    fn render_collects_metadata() {
        let generator = PageGenerator::new(PagesConfig::default());
        let doc = Document::parse(
            "guide/start.md",
            "---\ntitle: Start\nlink: /start\n---\n## Setup\n## Setup\n#### Deep\n".to_string(),
        )
        .unwrap();

        let page = generator.render(&doc);

        assert_eq!(page.title, "Start");
        assert_eq!(page.link, "/start");
        assert_eq!(page.output_path, PathBuf::from("guide/start.html"));
        let ids: Vec<_> = page.table_of_contents.iter().map(|e| e.anchor_id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "setup-1"]);
        assert!(page.html.contains("<h4>Deep</h4>"));
    }

    #[test]
    fn missing_front_matter_defaults_to_empty_fields() {
        let generator = PageGenerator::new(PagesConfig::default());
        let doc = Document::parse("plain.md", "Just text.\n".to_string()).unwrap();

        let page = generator.render(&doc);

        assert_eq!(page.title, "");
        assert_eq!(page.link, "");
        assert!(page.content().starts_with("<details id=\"toc\"><summary>Table of contents</summary></details>"));
    }

    #[test]
    fn toc_marker_places_block() {
        let generator = PageGenerator::new(PagesConfig::default());
        let doc = Document::parse("m.md", "Lead.\n\n<!-- toc -->\n\n## A\n".to_string()).unwrap();

        let content = generator.render(&doc).content();

        let lead = content.find("<p>Lead.</p>").unwrap();
        let toc = content.find("<details id=\"toc\">").unwrap();
        assert!(lead < toc);
        assert!(!content.contains("<!-- toc -->"));
    }

    #[test]
    fn front_matter_fields_reach_the_template() {
        let fx = fixture(&[("a.md", "---\ntitle: A\nauthor: Ada\nempty:\n---\nx\n")]);
        fs::write(
            &fx.config.template_path,
            "<%= author %>|<%= empty %>|<%= path %>|<%= nope %>",
        )
        .unwrap();

        PageGenerator::new(fx.config.clone()).build().unwrap();

        let html = fs::read_to_string(fx.config.output_dir.join("a.html")).unwrap();
        assert_eq!(html, "Ada||a.html|");
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let fx = fixture(&[
            ("index.md", "# Home\n"),
            ("elements/readme.md", "# Element\n"),
            ("bower_components/lib/README.md", "# Lib\n"),
            ("guide/elements/nested.md", "# Nested\n"),
            ("notes.txt", "not markdown"),
        ]);

        let generator = PageGenerator::new(fx.config.clone());
        let sources = generator.discover().unwrap();

        assert_eq!(
            sources,
            vec![
                PathBuf::from("guide/elements/nested.md"),
                PathBuf::from("index.md"),
            ]
        );

        generator.build().unwrap();
        assert!(!fx.config.output_dir.join("elements").exists());
        assert!(!fx.config.output_dir.join("bower_components").exists());
    }

    #[test]
    fn rebuild_is_byte_identical() {
        let fx = fixture(&[(
            "docs/page.md",
            "---\ntitle: Same\n---\n# A\n\n```rust\nfn x() {}\n```\n## B\n## B\n",
        )]);
        let generator = PageGenerator::new(fx.config.clone());
        let out = fx.config.output_dir.join("docs/page.html");

        generator.build().unwrap();
        let first = fs::read(&out).unwrap();
        generator.build().unwrap();
        let second = fs::read(&out).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn output_path_rewrites_extension() {
        assert_eq!(output_path(Path::new("docs/intro.md")), PathBuf::from("docs/intro.html"));
        assert_eq!(output_path(Path::new("a.b.md")), PathBuf::from("a.b.html"));
        assert_eq!(output_path(Path::new("x/y/z.markdown")), PathBuf::from("x/y/z.html"));
    }

    #[test]
    fn missing_template_aborts_before_pages() {
        let fx = fixture(&[("index.md", "# Home\n")]);
        fs::remove_file(&fx.config.template_path).unwrap();

        let result = PageGenerator::new(fx.config.clone()).build();

        assert!(matches!(result, Err(BuildError::TemplateMissing { .. })));
        assert!(!fx.config.output_dir.exists());
    }

    #[test]
    fn invalid_front_matter_fails_only_that_page() {
        let fx = fixture(&[
            ("bad.md", "---\ntitle: [oops\n---\n"),
            ("good.md", "# Good\n"),
        ]);

        let result = PageGenerator::new(fx.config.clone()).build();

        assert!(matches!(result, Err(BuildError::FrontMatter { .. })));
        assert!(fx.config.output_dir.join("good.html").exists());
        assert!(!fx.config.output_dir.join("bad.html").exists());
    }

    #[test]
    fn unreadable_source_fails_without_output() {
        let fx = fixture(&[("good.md", "# Good\n")]);
        let broken = fx.config.source_dir.join("broken.md");
        fs::write(&broken, [0xffu8, 0xfe, b'#', b'\n']).unwrap();

        let result = PageGenerator::new(fx.config.clone()).build();

        match result {
            Err(BuildError::Read { path, .. }) => assert_eq!(path, broken),
            other => panic!("expected read error, got {other:?}"),
        }
        assert!(!fx.config.output_dir.join("broken.html").exists());
        assert!(!fx.config.output_dir.join("broken.html.tmp").exists());
        assert!(fx.config.output_dir.join("good.html").exists());
    }

    #[cfg(unix)]
    #[test]
    fn walk_error_fails_the_build() {
        let fx = fixture(&[("index.md", "# Home\n"), ("guide/start.md", "# Start\n")]);
        let link = fx.config.source_dir.join("guide/loop");
        std::os::unix::fs::symlink(&fx.config.source_dir, &link).unwrap();

        let result = PageGenerator::new(fx.config.clone()).build();

        match result {
            Err(BuildError::Read { path, .. }) => assert_eq!(path, link),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn toc_entries_reach_the_template() {
        let fx = fixture(&[("a.md", "# One\n## Two\n")]);
        fs::write(
            &fx.config.template_path,
            "<% for e in toc_entries %><%= e.level %>:<%= e.anchor_id %>;<% endfor %>",
        )
        .unwrap();

        PageGenerator::new(fx.config.clone()).build().unwrap();

        let html = fs::read_to_string(fx.config.output_dir.join("a.html")).unwrap();
        assert_eq!(html, "1:one;2:two;");
    }

    #[test]
    fn missing_source_dir_is_an_error() {
        let config = PagesConfig {
            source_dir: PathBuf::from("/nonexistent/app"),
            ..Default::default()
        };

        assert!(matches!(
            PageGenerator::new(config).discover(),
            Err(BuildError::MissingSource(_))
        ));
    }
}
