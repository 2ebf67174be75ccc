//! Rendering of the operator-editable mail templates.

use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;

use crate::settings::TemplateDoc;

// Missing context keys render empty and are falsy in `{% if %}`; only
// malformed template syntax is an error.
static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env
});

/// Renders a template document against a context, returning `(subject, html)`.
pub fn render(
    doc: &TemplateDoc,
    ctx: &minijinja::Value,
) -> Result<(String, String), minijinja::Error> {
    let subject = ENV.render_str(&doc.subject, ctx)?;
    let html = ENV.render_str(&doc.html, ctx)?;
    Ok((subject, html))
}

/// Compile check backing the settings write path.
pub fn validate(doc: &TemplateDoc) -> Result<(), minijinja::Error> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.template_from_str(&doc.subject)?;
    env.template_from_str(&doc.html)?;
    Ok(())
}
