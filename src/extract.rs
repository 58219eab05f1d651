//! Recovery of a JSON object from free-form model output.
//!
//! Models asked for "ONLY valid JSON" still wrap their answer in prose,
//! markdown fences, or a reasoning preamble. [`extract_object`] tries, in
//! order:
//!
//! 1. the whole response as JSON,
//! 2. the contents of the first fenced block (optionally language-tagged),
//! 3. every balanced `{...}` span (one nested level), last span first.
//!
//! A miss is an expected outcome here, not an error: the caller substitutes
//! its fallback.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

const FENCE: &str = "```";

/// Recover a JSON object from `response`, or `None` if nothing usable is in it.
pub fn extract_object(response: &str) -> Option<Map<String, Value>> {
    if let Some(object) = parse_object(response) {
        return Some(object);
    }

    if let Some(block) = fenced_block(response) {
        if let Some(object) = parse_object(block) {
            return Some(object);
        }
    }

    // Reasoning usually comes first and the answer last, so scan backwards.
    let found = brace_spans(response)
        .into_iter()
        .rev()
        .find_map(parse_object);

    if found.is_none() {
        debug!(length = response.len(), "No JSON object found in model response");
    }

    found
}

/// Recover an object and deserialize it into `T`.
///
/// Returns `None` when no object is found or it does not fit `T`.
pub fn extract_as<T: DeserializeOwned>(response: &str) -> Option<T> {
    let object = extract_object(response)?;
    match serde_json::from_value(Value::Object(object)) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Model JSON did not match the expected shape");
            None
        }
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Contents of the first ``` fence, with any language tag removed.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];
    let tag_len = after_open
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_open.len());
    let body = &after_open[tag_len..];
    let close = body.find(FENCE)?;
    Some(body[..close].trim())
}

/// Non-overlapping `{...}` spans, left to right, allowing one level of
/// nested braces inside each span.
fn brace_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = span_end(bytes, i) {
                spans.push(&text[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }

    spans
}

/// Index of the `}` closing the span opened at `start`, if the span is
/// balanced within one nesting level.
fn span_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut j = start + 1;
    loop {
        match bytes.get(j)? {
            b'}' => return Some(j),
            b'{' => {
                let mut k = j + 1;
                loop {
                    match bytes.get(k)? {
                        b'}' => break,
                        b'{' => return None,
                        _ => k += 1,
                    }
                }
                j = k + 1;
            }
            _ => j += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_plain_json() {
        let expected = json!({"diseases": ["Flu"], "urgency": "low", "advice": "Rest"});
        let text = serde_json::to_string(&expected).unwrap();
        assert_eq!(extract_object(&text), Some(object(expected)));
    }

    #[test]
    fn test_fenced_json() {
        let expected = json!({"status": "normal", "alerts": [], "nested": {"a": {"b": 1}}});
        let text = format!("```json\n{}\n```", serde_json::to_string(&expected).unwrap());
        assert_eq!(extract_object(&text), Some(object(expected)));
    }

    #[test]
    fn test_untagged_fence_with_prose() {
        let text = "Here is the analysis:\n```\n{\"urgency\": \"high\"}\n```\nStay safe.";
        assert_eq!(extract_object(text), Some(object(json!({"urgency": "high"}))));
    }

    #[test]
    fn test_prefers_last_object() {
        let text = "Thinking: the template is {\"urgency\": \"low|medium\"} but the answer is \
                    {\"urgency\": \"medium\", \"advice\": {\"text\": \"rest\"}}";
        assert_eq!(
            extract_object(text),
            Some(object(json!({"urgency": "medium", "advice": {"text": "rest"}})))
        );
    }

    #[test]
    fn test_skips_invalid_trailing_span() {
        let text = "{\"ok\": true} and then {not json}";
        assert_eq!(extract_object(text), Some(object(json!({"ok": true}))));
    }

    #[test]
    fn test_prose_returns_none() {
        assert_eq!(extract_object("You should rest and drink fluids."), None);
        assert_eq!(extract_object(""), None);
        assert_eq!(extract_object("{ unbalanced"), None);
    }

    #[test]
    fn test_non_object_json_is_rejected() {
        assert_eq!(extract_object("42"), None);
        assert_eq!(extract_object("[1, 2, 3]"), None);
        assert_eq!(extract_object("null"), None);
    }

    #[test]
    fn test_deeply_nested_falls_back_to_inner_span() {
        // Two levels of nesting cannot be matched as a whole; the inner
        // span with one nested level is still found.
        let text = "prefix {\"a\": {\"b\": {\"c\": 1}}} suffix";
        assert_eq!(extract_object(text), Some(object(json!({"b": {"c": 1}}))));
    }

    #[test]
    fn test_multibyte_text_around_json() {
        let text = "निदान: {\"urgency\": \"low\"} ✓";
        assert_eq!(extract_object(text), Some(object(json!({"urgency": "low"}))));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Hospitals {
        hospitals: Vec<String>,
    }

    #[test]
    fn test_extract_as_typed() {
        let text = "```json\n{\"hospitals\": [\"City Hospital\"]}\n```";
        assert_eq!(
            extract_as::<Hospitals>(text),
            Some(Hospitals {
                hospitals: vec!["City Hospital".to_string()]
            })
        );
        assert_eq!(extract_as::<Hospitals>("{\"other\": 1}"), None);
    }
}
