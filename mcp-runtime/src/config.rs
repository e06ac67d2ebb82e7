use crate::error::BridgeError;

pub const URL_ENV: &str = "POCKETBASE_URL";
pub const ADMIN_EMAIL_ENV: &str = "POCKETBASE_ADMIN_EMAIL";
pub const ADMIN_PASSWORD_ENV: &str = "POCKETBASE_ADMIN_PASSWORD";

/// Superuser credential pair.
#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the session connects and who it authenticates as.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(
        mut self,
        identity: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            identity: identity.into(),
            password: password.into(),
        });
        self
    }

    /// Build from raw values. The URL is mandatory; credentials only count
    /// when both halves are present and non-blank. The password is kept
    /// byte for byte.
    pub fn from_parts(
        url: Option<String>,
        identity: Option<String>,
        password: Option<String>,
    ) -> Result<Self, BridgeError> {
        let url = non_blank(url).ok_or_else(|| {
            BridgeError::configuration(format!("{URL_ENV} environment variable is not set"))
        })?;
        let config = BackendConfig::new(url.trim_end_matches('/'));
        let password = password.filter(|value| !value.trim().is_empty());
        Ok(match (non_blank(identity), password) {
            (Some(identity), Some(password)) => config.with_credentials(identity, password),
            _ => config,
        })
    }

    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_parts(
            std::env::var(URL_ENV).ok(),
            std::env::var(ADMIN_EMAIL_ENV).ok(),
            std::env::var(ADMIN_PASSWORD_ENV).ok(),
        )
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
