//! `{{variable}}` substitution for subjects and bodies.
//!
//! Values are inserted verbatim: no HTML escaping is applied, so callers
//! passing untrusted data into an HTML body must sanitize it themselves.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::models::{RenderedTemplate, TemplateData, TemplateDefinition};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Replace every `{{key}}` whose key is present in `data`.
///
/// Unknown keys are left as-is, braces included. Substituted text is not
/// scanned again.
pub fn render(pattern: &str, data: &TemplateData) -> String {
    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures| match data.get(&caps[1]) {
            Some(value) => value_to_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render subject and body of a template with the same data
pub fn render_template(template: &TemplateDefinition, data: &TemplateData) -> RenderedTemplate {
    RenderedTemplate {
        subject: render(&template.subject, data),
        body: render(&template.body, data),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
