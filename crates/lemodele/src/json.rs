//! JSON extraction from model output

use serde_json::Value;

/// Parse the JSON object contained in a model response.
///
/// Accepts bare JSON, JSON wrapped in a ``` / ```json fence, or JSON
/// surrounded by prose (the outermost `{...}` span is tried last).
pub fn parse_json_block(response: &str) -> Option<Value> {
    let trimmed = response.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let unfenced = strip_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&unfenced[start..=end]).ok()
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().trim_end_matches('`').trim()
}
