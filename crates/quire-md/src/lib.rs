//! Markdown documents for quire.
//!
//! This crate splits source documents into YAML front matter and body, renders
//! the body to HTML with classed syntax highlighting, and annotates headings
//! with anchors and a table of contents.

pub mod document;
pub mod frontmatter;
pub mod highlight;
pub mod render;
pub mod toc;

pub use document::Document;
pub use frontmatter::{extract_front_matter, FrontMatter, FrontmatterError};
pub use highlight::{HighlightError, Highlighter};
pub use render::render_markdown;
pub use toc::{annotate_headings, insert_toc, slugify, toc_block, Annotated, TocEntry, TOC_MARKER};
