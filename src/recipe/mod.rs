//! The Rails application recipe: every step the generator knows about,
//! registered under the names `roll --list` shows.

use crate::actions::{Pattern, Position};
use crate::error::Result;
use crate::registry::StepRegistry;
use crate::step::StepContext;

pub mod builder;
pub mod generator;

/// Registers every builder step and generator group of the recipe.
///
/// # Errors
/// * `Error::DuplicateStep` if `registry` already holds one of the names
pub fn register_steps(registry: &mut StepRegistry) -> Result<()> {
    for step in builder::steps().into_iter().chain(generator::groups()) {
        registry.register(step)?;
    }
    Ok(())
}

/// A registry holding the full recipe.
pub fn catalog() -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    register_steps(&mut registry)?;
    Ok(registry)
}

/// Inserts `text` right after the line opening `class <class_name>`.
fn inject_into_class(
    ctx: &StepContext<'_>,
    path: &str,
    class_name: &str,
    text: &str,
) -> Result<()> {
    let anchor = Pattern::regex(&format!(
        r"(?m)^[ \t]*class[ \t]+{}\b.*\n",
        regex::escape(class_name)
    ))?;
    ctx.actions.inject_at(path, text, &anchor, Position::After)
}

/// Adds a setting at the end of the `configure` block of an environment file.
fn configure_environment(ctx: &StepContext<'_>, environment: &str, config: &str) -> Result<()> {
    ctx.actions.inject_at(
        format!("config/environments/{environment}.rb"),
        &format!("\n\n  {config}"),
        &Pattern::literal("\nend"),
        Position::Before,
    )
}

/// The shared template context extended with step-specific values.
fn merge_context(ctx: &StepContext<'_>, extra: serde_json::Value) -> serde_json::Value {
    let mut context = ctx.template_context();
    if let (Some(base), serde_json::Value::Object(extra)) = (context.as_object_mut(), extra) {
        base.extend(extra);
    }
    context
}
