//! HTML templates for the dashboard
//!
//! Rendered with minijinja; `.html` templates are auto-escaped, so only the
//! chart SVG is marked safe.

use crate::research::ResearchReport;
use minijinja::{Environment, UndefinedBehavior, context};

const INDEX: &str = "index.html";

pub fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.add_template(INDEX, include_str!("templates/index.html"))?;
    Ok(env)
}

/// What one page shows besides the form
#[derive(Debug, Default)]
pub struct PageView<'a> {
    pub ticker: &'a str,
    pub selected: &'a [String],
    pub error: Option<String>,
    pub result: Option<&'a ResearchReport>,
}

pub fn render_index(
    env: &Environment<'_>,
    options: &[String],
    range: &str,
    config_error: Option<&str>,
    view: &PageView<'_>,
) -> Result<String, minijinja::Error> {
    env.get_template(INDEX)?.render(context! {
        options => options,
        range => range,
        config_error => config_error,
        ticker => view.ticker,
        selected => view.selected,
        error => view.error.as_deref(),
        result => view.result,
    })
}
