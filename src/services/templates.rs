//! `{{key}}` substitution over a studio's stored message templates.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::db::store::TemplateStore;
use crate::models::notification::TemplateVars;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found or inactive: {0}")]
    TemplateNotFound(String),
    #[error("template lookup failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// Output of a substitution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no matching variable, left intact in `text`.
    pub missing: Vec<String>,
}

/// Replace every `{{key}}` with `vars[key]`. Whitespace inside the braces is
/// ignored. Unknown keys and unterminated `{{` are copied through unchanged.
pub fn substitute(template: &str, vars: &TemplateVars) -> Rendered {
    let mut text = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        text.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            text.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = after_open[..end].trim();
        match vars.get(key) {
            Some(value) => text.push_str(value),
            None => {
                text.push_str(&rest[start..start + 2 + end + 2]);
                if !missing.iter().any(|m| m == key) {
                    missing.push(key.to_string());
                }
            }
        }
        rest = &after_open[end + 2..];
    }
    text.push_str(rest);

    Rendered { text, missing }
}

#[derive(Clone)]
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Render the studio's active template for `template_type`.
    pub async fn render(
        &self,
        tenant: &str,
        template_type: &str,
        vars: &TemplateVars,
    ) -> Result<String, RenderError> {
        let template = self
            .store
            .active_template(tenant, template_type)
            .await?
            .ok_or_else(|| RenderError::TemplateNotFound(template_type.to_string()))?;

        let rendered = substitute(&template.message_template, vars);
        if !rendered.missing.is_empty() {
            warn!(
                "Template '{template_type}' for '{tenant}' rendered with missing variables: {}",
                rendered.missing.join(", ")
            );
        }
        Ok(rendered.text)
    }
}
