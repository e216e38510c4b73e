use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// Replace `{key}` placeholders with values from `data`.
///
/// Placeholders without a matching key are left untouched.
pub fn fill(template: &str, data: &Map<String, Value>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            match data.get(&caps[1]) {
                Some(value) => value_to_string(value),
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
