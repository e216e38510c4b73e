use serde_json::{Map, Value};

use crate::label::LabelRequest;

/// Keys that address the printer rather than describe the label.
const PRINTER_KEYS: [&str; 2] = ["printerName", "printer_name"];

/// A parsed `POST /print` body.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub label: LabelRequest,
    /// The label part of the body exactly as the client sent it; this is what
    /// gets queued.
    pub payload: Value,
    pub printer_name: Option<String>,
}

pub fn parse_print_request(body: &[u8]) -> Result<PrintJob, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| format!("Invalid JSON: {e}"))?;
    from_value(value)
}

pub fn from_value(value: Value) -> Result<PrintJob, String> {
    let Value::Object(mut object) = value else {
        return Err("Request body must be a JSON object".to_string());
    };

    let printer_name = take_printer_name(&mut object)?;
    let payload = Value::Object(object);

    let label = LabelRequest::deserialize_payload(&payload)
        .map_err(|e| format!("Invalid print request: {e}"))?;

    Ok(PrintJob {
        label,
        payload,
        printer_name,
    })
}

fn take_printer_name(object: &mut Map<String, Value>) -> Result<Option<String>, String> {
    let mut name = None;
    for key in PRINTER_KEYS {
        match object.remove(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => name = Some(s.trim().to_string()),
            Some(Value::String(_)) | Some(Value::Null) | None => {}
            Some(_) => return Err(format!("{key} must be a string")),
        }
    }
    Ok(name)
}
