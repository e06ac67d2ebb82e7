use serde::{Deserialize, Serialize};

/// Structured error payload carried inside an error envelope.
/// Designed for agents: a stable classification plus enough context to
/// fix the call without parsing free-form text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable classification (see [`codes`])
    pub error: String,
    /// Human/agent-readable description, including the backend's own text when available
    pub message: String,
    /// Which argument caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Hint about what the caller should do next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// Backend-provided details (HTTP status, validation data)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
            details: None,
        }
    }
}

/// Error classifications used in tool envelopes
pub mod codes {
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const NOT_FOUND: &str = "not_found";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const BACKEND_REQUEST_FAILED: &str = "backend_request_failed";
    pub const CONFIGURATION_ERROR: &str = "configuration_error";
    pub const AUTHENTICATION_FAILED: &str = "authentication_failed";
}
