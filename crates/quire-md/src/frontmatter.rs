//! Front matter extraction and parsing.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

/// Line that opens and closes a front matter block.
const DELIMITER: &str = "---";

/// Metadata parsed from the YAML block at the top of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrontMatter {
    fields: BTreeMap<String, Value>,
}

impl FrontMatter {
    /// Parse the YAML between the delimiters.
    ///
    /// An empty block yields empty metadata. Anything other than a mapping is
    /// rejected.
    pub fn parse(yaml: &str) -> Result<Self, FrontmatterError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?;

        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            _ => return Err(FrontmatterError::NotAMapping),
        };

        let mut fields = BTreeMap::new();
        for (key, value) in mapping {
            let key = scalar_to_string(&key).ok_or(FrontmatterError::NotAMapping)?;
            fields.insert(key, value);
        }

        Ok(Self { fields })
    }

    /// Look up a field as a string. Numbers and booleans are stringified.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(scalar_to_string)
    }

    /// Raw YAML value for a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split a document into front matter and body.
///
/// The block must open on the first line. A document without an opening
/// delimiter, or whose block is never closed, is returned whole as the body
/// with empty metadata.
pub fn extract_front_matter(source: &str) -> Result<(FrontMatter, &str), FrontmatterError> {
    let Some(after_open) = strip_opening_delimiter(source) else {
        tracing::debug!("No front matter block, using whole document as body");
        return Ok((FrontMatter::default(), source));
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let front_matter = FrontMatter::parse(&after_open[..offset])?;
            let body = &after_open[offset + line.len()..];
            return Ok((front_matter, body));
        }
        offset += line.len();
    }

    tracing::warn!("Front matter block is missing its closing ---, treating it as content");
    Ok((FrontMatter::default(), source))
}

/// Returns the text after the opening delimiter line, if there is one.
fn strip_opening_delimiter(source: &str) -> Option<&str> {
    let rest = source.strip_prefix(DELIMITER)?;
    let (line, rest) = match rest.find('\n') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (rest, ""),
    };

    line.trim().is_empty().then_some(rest)
}

/// Errors that can occur when parsing front matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Invalid YAML in front matter: {0}")]
    InvalidYaml(String),

    #[error("Front matter must be a mapping of keys to values")]
    NotAMapping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_valid_front_matter() {
        let source = "---\ntitle: Intro\nlink: /docs/intro\norder: 2\n---\n# Intro\n";

        let (fm, body) = extract_front_matter(source).unwrap();

        assert_eq!(fm.get_str("title"), Some("Intro".to_string()));
        assert_eq!(fm.get_str("link"), Some("/docs/intro".to_string()));
        assert_eq!(fm.get_str("order"), Some("2".to_string()));
        assert_eq!(body, "# Intro\n");
    }

    #[test]
    fn missing_block_returns_content_unchanged() {
        let source = "# Just Markdown\n\nNo front matter here.\n";

        let (fm, body) = extract_front_matter(source).unwrap();

        assert!(fm.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn delimiter_must_open_the_document() {
        let source = "\n---\ntitle: Late\n---\nbody";

        let (fm, body) = extract_front_matter(source).unwrap();

        assert!(fm.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn horizontal_rule_is_not_a_delimiter() {
        let source = "----\ntitle: x\n---\n";

        let (fm, body) = extract_front_matter(source).unwrap();

        assert!(fm.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn unclosed_block_falls_back_to_content() {
        let source = "---\ntitle: Test\n# No closing";

        let (fm, body) = extract_front_matter(source).unwrap();

        assert!(fm.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn empty_block_yields_empty_metadata() {
        let (fm, body) = extract_front_matter("---\n---\nText").unwrap();

        assert!(fm.is_empty());
        assert_eq!(body, "Text");
    }

    #[test]
    fn closing_delimiter_at_end_of_input() {
        let (fm, body) = extract_front_matter("---\ntitle: Only\n---").unwrap();

        assert_eq!(fm.get_str("title"), Some("Only".to_string()));
        assert_eq!(body, "");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let (fm, body) = extract_front_matter("---\r\ntitle: Win\r\n---\r\nBody\r\n").unwrap();

        assert_eq!(fm.get_str("title"), Some("Win".to_string()));
        assert_eq!(body, "Body\r\n");
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let result = extract_front_matter("---\ntitle: [invalid yaml\n---\n");

        assert!(matches!(result, Err(FrontmatterError::InvalidYaml(_))));
    }

    #[test]
    fn errors_on_non_mapping() {
        let result = extract_front_matter("---\n- one\n- two\n---\n");

        assert!(matches!(result, Err(FrontmatterError::NotAMapping)));
    }

    #[test]
    fn non_scalar_fields_have_no_string_form() {
        let (fm, _) = extract_front_matter("---\ntags: [a, b]\ndraft: true\n---\n").unwrap();

        assert_eq!(fm.len(), 2);
        assert!(fm.get("tags").is_some());
        assert_eq!(fm.get_str("tags"), None);
        assert_eq!(fm.get_str("draft"), Some("true".to_string()));
    }
}
