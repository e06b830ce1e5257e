//! Template rendering with named placeholder substitution
//!
//! Placeholders are `$name` or `${name}`; `$$` renders a literal `$`.
//! Rendering is purely textual. Repetition (one block per backend) is done
//! by the caller rendering once per item.

use std::path::Path;

use log::debug;
use regex::{Captures, Regex};
use tokio::fs;

use hapair_core::error::TemplateError;
use hapair_core::{Result, TemplateVariables};

const PLACEHOLDER_PATTERN: &str = r"\$(?:(?P<escaped>\$)|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<invalid>))";

/// Substitutes named variables into template text
pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    /// Create new template renderer
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"),
        }
    }

    /// Load the template at `path` and substitute `variables`
    pub async fn render(&self, path: &Path, variables: &TemplateVariables) -> Result<String> {
        if !path.exists() {
            return Err(TemplateError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let text = fs::read_to_string(path)
            .await
            .map_err(|source| TemplateError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Rendering template {:?}", path);
        self.render_str(&text, variables)
    }

    /// Substitute `variables` into `text`
    ///
    /// Every placeholder is checked before any output is produced, so a
    /// missing variable never yields partial text.
    pub fn render_str(&self, text: &str, variables: &TemplateVariables) -> Result<String> {
        for name in self.placeholders(text)? {
            if !variables.contains_key(&name) {
                return Err(TemplateError::MissingVariable { name }.into());
            }
        }

        let rendered = self.placeholder.replace_all(text, |caps: &Captures| {
            if caps.name("escaped").is_some() {
                return "$".to_string();
            }
            caps.name("named")
                .or_else(|| caps.name("braced"))
                .and_then(|name| variables.get(name.as_str()))
                .cloned()
                .unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }

    /// Names referenced by `text`, in order of first appearance
    pub fn placeholders(&self, text: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();

        for caps in self.placeholder.captures_iter(text) {
            if let Some(invalid) = caps.name("invalid") {
                let (line, column) = line_and_column(text, invalid.start());
                return Err(TemplateError::InvalidPlaceholder { line, column }.into());
            }

            if let Some(name) = caps.name("named").or_else(|| caps.name("braced")) {
                if !names.iter().any(|n| n == name.as_str()) {
                    names.push(name.as_str().to_string());
                }
            }
        }

        Ok(names)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// 1-based line and column of the `$` preceding `offset`
fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let dollar = offset.saturating_sub(1);
    let before = &text[..dollar];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => dollar - newline,
        None => dollar + 1,
    };
    (line, column)
}

/// Build template variables from name/value pairs
pub fn variables<I, K, V>(pairs: I) -> TemplateVariables
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
