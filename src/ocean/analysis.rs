use std::collections::HashMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::config::AnalysisParams;

/// Template for analysis kinds with a dedicated fragment.
pub fn analysis_template(kind: &str) -> Option<&'static str> {
    match kind {
        "tran" => Some("ocean/analysis_tran.ocn"),
        "dc" => Some("ocean/analysis_dc.ocn"),
        "ac" => Some("ocean/analysis_ac.ocn"),
        "noise" => Some("ocean/analysis_noise.ocn"),
        _ => None,
    }
}

/// Formats a configuration value as a SKILL literal.
///
/// Strings are double-quoted, numbers are emitted bare, booleans become
/// `t`/`nil` and sequences become `list(...)`.
pub fn ocean_literal(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::Bool(true) => "t".to_string(),
        Value::Bool(false) => "nil".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Sequence(items) => {
            let items = items.iter().map(ocean_literal).collect::<Vec<_>>();
            format!("list({})", items.join(" "))
        }
        Value::Mapping(_) => match serde_yaml::to_string(value) {
            Ok(s) => quote(s.trim()),
            Err(_) => "nil".to_string(),
        },
        Value::Tagged(tagged) => ocean_literal(&tagged.value),
    }
}

/// Formats a float the way SKILL reads it back; integral values drop the fraction.
pub fn ocean_number(value: f64) -> String {
    format!("{value}")
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Tera filter quoting a value as a SKILL string, registered as `skill_str`.
pub fn skill_str(
    value: &tera::Value,
    _: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = match value {
        tera::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Ok(tera::Value::String(quote(&s)))
}

/// One `?name value` pair handed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Ordered, pre-formatted parameters of one analysis.
pub fn analysis_params(params: &AnalysisParams) -> Vec<Param> {
    params
        .iter()
        .map(|(name, value)| Param {
            name: name.clone(),
            value: ocean_literal(value),
        })
        .collect()
}

/// Renders an analysis that has no dedicated template.
pub fn generic_analysis(kind: &str, params: &AnalysisParams) -> String {
    let mut out = format!(
        "; {} analysis configuration\nanalysis('{kind}\n",
        kind.to_uppercase()
    );
    for param in analysis_params(params) {
        out.push_str(&format!("         ?{} {}\n", param.name, param.value));
    }
    out.push_str(")\n");
    out
}
