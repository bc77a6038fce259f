//! Decoding of admin API error responses
//!
//! Failures come back either as S3 style XML documents or as JSON. Only a
//! short human-readable message is kept for the error value.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest message kept from an error body, in characters
const MAX_MESSAGE_CHARS: usize = 512;

static XML_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Code>(.*?)</Code>").expect("code pattern is valid"));
static XML_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Message>(.*?)</Message>").expect("message pattern is valid"));

/// Turn an error response body into a short message
pub fn decode_error_body(content_type: &str, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if trimmed.starts_with("<?xml") || content_type.contains("xml") {
        let code = capture(&XML_CODE, trimmed);
        let message = capture(&XML_MESSAGE, trimmed);
        let decoded = match (code, message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        };
        if let Some(decoded) = decoded {
            return truncate(&decoded);
        }
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return truncate(&value.to_string());
    }

    truncate(trimmed)
}

fn capture<'a>(pattern: &Regex, text: &'a str) -> Option<&'a str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
