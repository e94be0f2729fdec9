//! Classed syntax highlighting for code blocks.

use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Class naming used for highlighted spans and the matching stylesheet.
pub const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

/// Theme used for the generated highlighting stylesheet.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

/// Errors from the highlighter.
#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("Highlighting failed: {0}")]
    Syntect(#[from] syntect::Error),

    #[error("Unknown highlighting theme: {0}")]
    UnknownTheme(String),
}

/// Syntax highlighter configuration.
///
/// Built once per build and shared read-only between documents.
pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Highlighter {
    /// Create a highlighter with the bundled syntax definitions.
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Pick a syntax for `code`.
    ///
    /// The fence hint wins when it names a known syntax; otherwise the first
    /// line is matched against each syntax's first-line pattern.
    pub fn detect(&self, code: &str, hint: Option<&str>) -> Option<&SyntaxReference> {
        hint.filter(|h| !h.is_empty())
            .and_then(|h| self.syntax_set.find_syntax_by_token(h))
            .or_else(|| {
                code.lines()
                    .next()
                    .and_then(|line| self.syntax_set.find_syntax_by_first_line(line))
            })
    }

    /// Highlight `code` as `syntax`, wrapping tokens in classed spans.
    pub fn highlight(&self, code: &str, syntax: &SyntaxReference) -> Result<String, HighlightError> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, CLASS_STYLE);

        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }

        Ok(generator.finalize())
    }

    /// Render a code block as `<pre><code>`.
    ///
    /// Falls back to the escaped source when no syntax matches or
    /// highlighting fails.
    pub fn render_block(&self, code: &str, hint: Option<&str>) -> String {
        let syntax = self.detect(code, hint);
        let language = hint
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| syntax.map(language_class));

        let body = match syntax {
            Some(syntax) => match self.highlight(code, syntax) {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Falling back to plain code block: {}", e);
                    html_escape::encode_text(code).into_owned()
                }
            },
            None => html_escape::encode_text(code).into_owned(),
        };

        match language {
            Some(language) => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                html_escape::encode_double_quoted_attribute(&language),
                body
            ),
            None => format!("<pre><code>{}</code></pre>\n", body),
        }
    }

    /// Render an inline code span, if its language can be detected.
    ///
    /// Returns `None` for spans that should be emitted as plain escaped code.
    pub fn render_inline(&self, code: &str) -> Option<String> {
        let syntax = self.detect(code, None)?;

        match self.highlight(code, syntax) {
            Ok(html) => Some(format!(
                "<code class=\"language-{}\">{}</code>",
                language_class(syntax),
                html
            )),
            Err(e) => {
                tracing::warn!("Falling back to plain inline code: {}", e);
                None
            }
        }
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Short language name for a `language-*` class.
fn language_class(syntax: &SyntaxReference) -> String {
    syntax
        .file_extensions
        .first()
        .cloned()
        .unwrap_or_else(|| syntax.name.to_lowercase().replace(' ', "-"))
}

/// Stylesheet for the spans emitted by [`Highlighter`].
pub fn theme_css(theme_name: &str) -> Result<String, HighlightError> {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(theme_name)
        .ok_or_else(|| HighlightError::UnknownTheme(theme_name.to_string()))?;

    Ok(css_for_theme_with_class_style(theme, CLASS_STYLE)?)
}
