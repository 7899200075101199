//! # Templates
//!
//! The HTML pages are minijinja templates compiled into the binary. Their `.html` names turn on
//! HTML auto-escaping, so every value is escaped unless a template marks it `|safe`.

use crate::error::Result;
use minijinja::Environment;
use serde::Serialize;

pub const REPORT_TEMPLATE: &str = "report.html";
pub const INDEX_TEMPLATE: &str = "index.html";

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template(REPORT_TEMPLATE, include_str!("templates/report.html"))?;
    env.add_template(INDEX_TEMPLATE, include_str!("templates/index.html"))?;
    Ok(env)
}

pub fn render<S: Serialize>(name: &str, context: S) -> Result<String> {
    let env = environment()?;
    let html = env.get_template(name)?.render(context)?;
    Ok(html)
}
