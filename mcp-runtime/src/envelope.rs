use serde::Serialize;
use serde_json::{Value, json};

use crate::error::BridgeError;

/// Used when a payload cannot be rendered; always valid JSON.
const FORMAT_FAILURE_TEXT: &str =
    r#"{"error":"backend_request_failed","message":"failed to format tool result"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Uniform tool result: one text block holding JSON, plus `isError` on
/// failure. Success leaves `isError` absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl Envelope {
    fn text(text: String, is_error: Option<bool>) -> Self {
        Self {
            content: vec![TextContent { kind: "text", text }],
            is_error,
        }
    }

    /// Plain strings are passed through; anything else is pretty JSON.
    pub fn success(payload: &Value) -> Self {
        match payload {
            Value::String(text) => Self::text(text.clone(), None),
            other => match serde_json::to_string_pretty(other) {
                Ok(text) => Self::text(text, None),
                Err(_) => Self::format_failure(),
            },
        }
    }

    pub fn failure(err: &BridgeError) -> Self {
        match serde_json::to_string_pretty(&err.to_payload()) {
            Ok(text) => Self::text(text, Some(true)),
            Err(_) => Self::format_failure(),
        }
    }

    pub fn from_result(result: &Result<Value, BridgeError>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(err) => Self::failure(err),
        }
    }

    pub fn format_failure() -> Self {
        Self::text(FORMAT_FAILURE_TEXT.to_string(), Some(true))
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// JSON form for the `tools/call` result. Built by hand so it cannot fail.
    pub fn to_value(&self) -> Value {
        let content: Vec<Value> = self
            .content
            .iter()
            .map(|block| json!({ "type": block.kind, "text": block.text }))
            .collect();
        let mut value = json!({ "content": content });
        if let Some(is_error) = self.is_error {
            value["isError"] = Value::Bool(is_error);
        }
        value
    }

    /// Parse the first text block back into JSON, if it is JSON.
    #[cfg(test)]
    pub(crate) fn payload(&self) -> Option<Value> {
        self.content
            .first()
            .and_then(|block| serde_json::from_str(&block.text).ok())
    }
}
