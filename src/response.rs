use serde::Deserialize;
use serde_json::Value;

/// `{"error": "..."}` as returned by the reports views.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

const MAX_RAW_BODY: usize = 200;

/// Flatten an error body into one message. Handles the views' `{"error"}`
/// shape, `{"detail"}` and serializer field-error maps
/// (`{"columns": ["Invalid column 'x'"]}`); anything else falls back to the
/// raw body or the status code.
pub fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(resp) = serde_json::from_slice::<ErrorResponse>(body) {
        return resp.error;
    }

    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(Value::String(detail)) = map.get("detail") {
            return detail.clone();
        }

        let parts: Vec<String> = map
            .iter()
            .filter_map(|(field, errors)| {
                let text = flatten(errors);
                if text.is_empty() {
                    None
                } else if field == "non_field_errors" {
                    Some(text)
                } else {
                    Some(format!("{}: {}", field, text))
                }
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if raw.is_empty() {
        format!("request failed with status {}", status)
    } else {
        raw.chars().take(MAX_RAW_BODY).collect()
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .values()
            .map(flatten)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
