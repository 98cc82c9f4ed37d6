//! Stream error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; `detail` is what the user sees.
    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid endpoint: {0}")]
    InvalidUrl(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Build the user-facing message for a failed (non-streaming) response body.
///
/// Handles:
/// - `{"detail": "..."}`
/// - `{"detail": [{"msg": "..."}, ...]}` (validation errors)
/// - `{"message": "..."}` / `{"error": "..."}`
///
/// Anything else falls back to a generic status message.
#[must_use]
pub fn extract_detail(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| detail_from_json(&json))
        .unwrap_or_else(|| format!("Request failed (HTTP {status})"))
}

fn detail_from_json(json: &serde_json::Value) -> Option<String> {
    if let Some(detail) = json.get("detail") {
        if let Some(msg) = detail.as_str() {
            return Some(msg.to_string());
        }
        if let Some(items) = detail.as_array() {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
    }

    ["message", "error"]
        .iter()
        .find_map(|key| json.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_detail() {
        assert_eq!(
            extract_detail(500, r#"{"detail":"model unavailable"}"#),
            "model unavailable"
        );
    }

    #[test]
    fn test_validation_detail() {
        let body = r#"{"detail":[{"loc":["body","message"],"msg":"field required"},{"msg":"too long"}]}"#;
        assert_eq!(extract_detail(422, body), "field required; too long");
    }

    #[test]
    fn test_message_fallback() {
        assert_eq!(extract_detail(503, r#"{"message":"maintenance"}"#), "maintenance");
        assert_eq!(extract_detail(400, r#"{"error":"bad input"}"#), "bad input");
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(extract_detail(502, "<html>Bad Gateway</html>"), "Request failed (HTTP 502)");
        assert_eq!(extract_detail(500, ""), "Request failed (HTTP 500)");
        assert_eq!(extract_detail(500, r#"{"detail":null}"#), "Request failed (HTTP 500)");
    }
}
