//! Source documents.

use std::path::PathBuf;

use crate::frontmatter::{extract_front_matter, FrontMatter, FrontmatterError};

/// One source file, split into metadata and body.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the source root
    pub source_path: PathBuf,

    /// Full text as read from disk
    pub raw_content: String,

    /// Parsed front matter (empty when the document has none)
    pub front_matter: FrontMatter,

    /// Markup remaining after the front matter block
    pub body: String,
}

impl Document {
    /// Split raw content into front matter and body.
    pub fn parse(
        source_path: impl Into<PathBuf>,
        raw_content: String,
    ) -> Result<Self, FrontmatterError> {
        let (front_matter, body) = extract_front_matter(&raw_content)?;
        let body = body.to_string();

        Ok(Self {
            source_path: source_path.into(),
            raw_content,
            front_matter,
            body,
        })
    }

    /// String field from the front matter, or empty.
    pub fn field(&self, key: &str) -> String {
        self.front_matter.get_str(key).unwrap_or_default()
    }
}
