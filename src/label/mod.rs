//! Label payloads and their rendering to ZPL markup.
//!
//! The queue stores payloads as opaque JSON; this module is the only place
//! that gives them meaning.

pub mod template;
pub mod zpl;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::LabelConfig;

/// A label to print, as submitted by a client and stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRequest {
    #[serde(default = "default_label_type", alias = "label_type")]
    pub label_type: String,
    pub data: Map<String, Value>,
    #[serde(
        default,
        alias = "markup_template",
        alias = "zpl_template",
        skip_serializing_if = "Option::is_none"
    )]
    pub markup_template: Option<String>,
    #[serde(default, alias = "dual_column", alias = "duas_colunas")]
    pub dual_column: bool,
    #[serde(default, alias = "data_col2", skip_serializing_if = "Option::is_none")]
    pub data_col2: Option<Map<String, Value>>,
}

fn default_label_type() -> String {
    "product".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Product,
    Custom,
}

impl LabelRequest {
    /// Read a label back out of a stored queue payload.
    pub fn deserialize_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(payload)
    }

    /// Anything that is not a product label is rendered from its custom template.
    pub fn kind(&self) -> LabelKind {
        match self.label_type.trim().to_ascii_lowercase().as_str() {
            "product" | "produto" => LabelKind::Product,
            _ => LabelKind::Custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    EmptyTemplate,
    Malformed(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::EmptyTemplate => write!(f, "custom markup template is empty"),
            RenderError::Malformed(msg) => write!(f, "malformed markup: {msg}"),
        }
    }
}

pub fn render(request: &LabelRequest, config: &LabelConfig) -> Result<String, RenderError> {
    match request.kind() {
        LabelKind::Product if request.dual_column => {
            let right = request.data_col2.as_ref().unwrap_or(&request.data);
            Ok(zpl::dual_column_label(&request.data, right, config))
        }
        LabelKind::Product => Ok(zpl::product_label(&request.data, config)),
        LabelKind::Custom => match request.markup_template.as_deref() {
            None | Some("") => Ok(zpl::product_label(&request.data, config)),
            Some(tmpl) if tmpl.trim().is_empty() => Err(RenderError::EmptyTemplate),
            Some(tmpl) => Ok(template::fill(tmpl, &request.data)),
        },
    }
}

/// A ZPL format must open with `^XA` and close with `^XZ`.
pub fn validate(markup: &str) -> Result<(), RenderError> {
    let markup = markup.trim();
    if !markup.starts_with("^XA") {
        return Err(RenderError::Malformed("missing ^XA start command".to_string()));
    }
    if !markup.ends_with("^XZ") {
        return Err(RenderError::Malformed("missing ^XZ end command".to_string()));
    }
    Ok(())
}
