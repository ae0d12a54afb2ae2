//! Prompt templates
//!
//! Agent goals, backstories, task descriptions and expected outputs are
//! MiniJinja templates rendered against the kickoff [`Inputs`]. Rendering is
//! strict: a variable missing from the inputs is an error, not an empty string.

use crate::{CrewError, Result};
use crew_core::Inputs;
use minijinja::{Environment, UndefinedBehavior};

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

/// Check that `source` parses
pub fn validate(name: &str, source: &str) -> Result<()> {
    environment()
        .template_from_str(source)
        .map(|_| ())
        .map_err(|e| CrewError::Template {
            name: name.to_string(),
            detail: e.to_string(),
        })
}

/// Render `source` with the kickoff inputs
pub fn render(name: &str, source: &str, inputs: &Inputs) -> Result<String> {
    let ctx = minijinja::Value::from_serialize(inputs.to_value());
    environment()
        .render_str(source, ctx)
        .map_err(|e| CrewError::Template {
            name: name.to_string(),
            detail: e.to_string(),
        })
}
