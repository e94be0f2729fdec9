//! Page template rendering.
//!
//! Templates use `<%= name %>` placeholders. Values are inserted verbatim and
//! placeholders without a value render as the empty string.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};

use crate::error::BuildError;

const TEMPLATE_NAME: &str = "page";

/// Data passed to a template.
pub type TemplateData = BTreeMap<String, Value>;

/// A compiled page template.
pub struct PageTemplate {
    env: Environment<'static>,
}

impl PageTemplate {
    /// Read and compile the template at `path`.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let source = fs::read_to_string(path).map_err(|source| BuildError::TemplateMissing {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_source(source)
    }

    /// Compile a template from a string.
    pub fn from_source(source: impl Into<String>) -> Result<Self, BuildError> {
        let syntax = SyntaxConfig::builder()
            .block_delimiters("<%", "%>")
            .variable_delimiters("<%=", "%>")
            .comment_delimiters("<%#", "%>")
            .build()?;

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        env.add_template_owned(TEMPLATE_NAME, source.into())?;

        Ok(Self { env })
    }

    /// Render the template with `data`.
    pub fn render(&self, data: &TemplateData) -> Result<String, BuildError> {
        let tmpl = self.env.get_template(TEMPLATE_NAME)?;

        let mut missing: Vec<String> = tmpl
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !data.contains_key(name))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            tracing::debug!("Template placeholders without a value: {}", missing.join(", "));
        }

        Ok(tmpl.render(data)?)
    }
}
