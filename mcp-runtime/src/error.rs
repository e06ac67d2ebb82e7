use pbmcp_core::error::{ErrorPayload, codes};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ADMIN_EMAIL_ENV, ADMIN_PASSWORD_ENV, URL_ENV};

/// Every failure a tool call can end in. Matched explicitly at the
/// dispatcher boundary and turned into an error envelope.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// A required configuration value is missing or malformed.
    #[error("{message}")]
    Configuration { message: String },

    /// The backend rejected the admin credentials.
    #[error("PocketBase admin authentication failed: {reason}")]
    Authentication { reason: String },

    /// A privileged tool was called without an authenticated session.
    #[error("{message}")]
    Unauthenticated { message: String },

    /// The target collection or resource does not exist.
    #[error("{message}")]
    NotFound { message: String },

    /// Arguments did not match the tool schema.
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Any other backend-reported or transport failure.
    #[error("{message}")]
    Backend {
        message: String,
        status: Option<u16>,
        details: Option<Value>,
    },
}

impl BridgeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BridgeError::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(reason: impl Into<String>) -> Self {
        BridgeError::Authentication {
            reason: reason.into(),
        }
    }

    pub fn unauthenticated(action: &str) -> Self {
        BridgeError::Unauthenticated {
            message: format!(
                "{action} requires PocketBase superuser access. Configure {ADMIN_EMAIL_ENV} and {ADMIN_PASSWORD_ENV}."
            ),
        }
    }

    /// Gate rejection after the backend refused the configured credentials.
    pub fn credentials_rejected(action: &str, reason: &str) -> Self {
        BridgeError::Unauthenticated {
            message: format!(
                "{action} requires PocketBase superuser access, but the configured superuser credentials were rejected: {reason}"
            ),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BridgeError::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        BridgeError::Backend {
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Configuration { .. } => codes::CONFIGURATION_ERROR,
            BridgeError::Authentication { .. } => codes::AUTHENTICATION_FAILED,
            BridgeError::Unauthenticated { .. } => codes::UNAUTHENTICATED,
            BridgeError::NotFound { .. } => codes::NOT_FOUND,
            BridgeError::Validation { .. } => codes::VALIDATION_FAILED,
            BridgeError::Backend { .. } => codes::BACKEND_REQUEST_FAILED,
        }
    }

    fn docs_hint(&self) -> Option<String> {
        match self {
            BridgeError::Configuration { .. } => Some(format!(
                "Set {URL_ENV} (for example http://127.0.0.1:8090) in the environment or .env file."
            )),
            BridgeError::Authentication { .. } | BridgeError::Unauthenticated { .. } => {
                Some(format!(
                    "Set both {ADMIN_EMAIL_ENV} and {ADMIN_PASSWORD_ENV} to a superuser account, then restart the server."
                ))
            }
            BridgeError::NotFound { .. } => {
                Some("Call list_collections to see the available collection names.".to_string())
            }
            BridgeError::Validation { .. } | BridgeError::Backend { .. } => None,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let mut payload = ErrorPayload::new(self.code(), self.to_string());
        payload.docs_hint = self.docs_hint();
        match self {
            BridgeError::Validation { field, .. } => payload.field = field.clone(),
            BridgeError::Backend {
                status, details, ..
            } => {
                let mut extra = serde_json::Map::new();
                if let Some(status) = status {
                    extra.insert("status".to_string(), Value::from(*status));
                }
                if let Some(details) = details {
                    extra.insert("data".to_string(), details.clone());
                }
                if !extra.is_empty() {
                    payload.details = Some(Value::Object(extra));
                }
            }
            _ => {}
        }
        payload
    }
}
