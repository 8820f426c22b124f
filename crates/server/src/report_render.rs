//! HTML rendering for budget reports using Tera templates.

use std::collections::HashMap;

use tera::{Context, Tera};
use thiserror::Error;
use trainhub_core::reports::ReportData;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
}

/// Register custom Tera filters used by report templates.
///
/// - `money`: 2-decimal rounding, e.g. `amount | money`. Accepts numbers and
///   numeric strings, since decimal amounts serialize as strings.
/// - `percent`: 1-decimal rounding with a trailing `%`.
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
    tera.register_filter("percent", tera_percent_filter);
}

fn numeric(value: &tera::Value) -> f64 {
    match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format!("{:.2}", numeric(value))))
}

fn tera_percent_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format!("{:.1}%", numeric(value))))
}

#[derive(Clone, Debug)]
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    /// Loads every template under `template_dir`.
    pub fn new(template_dir: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::new(&format!("{}/**/*", template_dir))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        register_template_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Builds a renderer from templates compiled into the binary, so the
    /// server does not depend on a template directory at runtime.
    pub fn with_embedded_templates() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(
            "budget.html.tera",
            include_str!("../../../templates/reports/budget.html.tera"),
        )
        .map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(Self { tera })
    }

    pub fn render_budget(&self, report: &ReportData) -> Result<String, RenderError> {
        let context = Context::from_serialize(report)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        self.tera
            .render("budget.html.tera", &context)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}
