use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::backend::{Backend, BackendConnector, PocketBaseConnector};
use crate::config::BackendConfig;
use crate::error::BridgeError;

/// The connected backend client plus the outcome of its one authentication
/// attempt. The flag lives next to the client it describes, so a retained
/// client and its flag can never disagree.
pub struct SessionHandle {
    pub id: Uuid,
    pub client: Arc<dyn Backend>,
    pub authenticated: bool,
    pub auth_failure: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("url", &self.client.base_url())
            .field("authenticated", &self.authenticated)
            .field("auth_failure", &self.auth_failure)
            .finish()
    }
}

/// Where the session reads its configuration at first connect.
type ConfigSource = Box<dyn Fn() -> Result<BackendConfig, BridgeError> + Send + Sync>;

/// Process-wide backend session, owned by the composition root and shared
/// with the dispatcher by `Arc`.
///
/// Initialization is single-flight: concurrent first callers wait on the same
/// cell, so only one authentication attempt reaches the backend.
pub struct Session {
    source: ConfigSource,
    connector: Arc<dyn BackendConnector>,
    cell: Mutex<Arc<OnceCell<Arc<SessionHandle>>>>,
}

impl Session {
    /// Session configured from the environment at first use.
    pub fn from_env() -> Self {
        Self::with_connector(None, Arc::new(PocketBaseConnector))
    }

    pub fn new(config: BackendConfig) -> Self {
        Self::with_connector(Some(config), Arc::new(PocketBaseConnector))
    }

    pub fn with_connector(
        config: Option<BackendConfig>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        match config {
            Some(config) => Self::with_source(move || Ok(config.clone()), connector),
            None => Self::with_source(BackendConfig::from_env, connector),
        }
    }

    /// Session whose configuration is resolved by `source` when it first
    /// connects, and again after every reset.
    pub fn with_source(
        source: impl Fn() -> Result<BackendConfig, BridgeError> + Send + Sync + 'static,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            source: Box::new(source),
            connector,
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    fn current_cell(&self) -> Arc<OnceCell<Arc<SessionHandle>>> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn current_handle(&self) -> Option<Arc<SessionHandle>> {
        self.current_cell().get().cloned()
    }

    /// Return the existing client, or connect (and authenticate when both
    /// credentials are configured). `config` overrides the session's own
    /// configuration for this first connection only.
    ///
    /// An authentication failure is reported to the caller that attempted it;
    /// the client is retained unauthenticated and later calls see
    /// `authenticated == false` without another attempt.
    pub async fn initialize(
        &self,
        config: Option<BackendConfig>,
    ) -> Result<Arc<SessionHandle>, BridgeError> {
        let cell = self.current_cell();
        let mut attempted = false;
        let handle = cell
            .get_or_try_init(|| {
                attempted = true;
                self.connect(config)
            })
            .await?
            .clone();

        match &handle.auth_failure {
            Some(reason) if attempted => Err(BridgeError::authentication(reason.clone())),
            _ => Ok(handle),
        }
    }

    /// The current client, initializing on first use.
    pub async fn get(&self) -> Result<Arc<SessionHandle>, BridgeError> {
        self.initialize(None).await
    }

    /// Pure read of the authentication flag. Never connects.
    pub fn is_authenticated(&self) -> bool {
        self.current_handle()
            .is_some_and(|handle| handle.authenticated)
    }

    /// Backend reason for a rejected authentication on the current client.
    pub fn auth_failure(&self) -> Option<String> {
        self.current_handle()
            .and_then(|handle| handle.auth_failure.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.current_handle().is_some()
    }

    /// Clear local auth state and drop the client so the next access
    /// reconnects from scratch.
    pub fn reset(&self) {
        let previous = {
            let mut guard = self.cell.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, Arc::new(OnceCell::new()))
        };
        if let Some(handle) = previous.get() {
            handle.client.clear_auth();
            tracing::info!(session_id = %handle.id, "backend session reset");
        }
    }

    /// Snapshot for status reporting. Does not connect.
    pub fn status(&self) -> Value {
        match self.current_handle() {
            Some(handle) => json!({
                "initialized": true,
                "authenticated": handle.authenticated,
                "url": handle.client.base_url(),
                "sessionId": handle.id,
                "connectedAt": handle.connected_at,
                "authFailure": handle.auth_failure,
            }),
            None => json!({
                "initialized": false,
                "authenticated": false,
                "url": (self.source)().ok().map(|config| config.url),
            }),
        }
    }

    async fn connect(
        &self,
        config: Option<BackendConfig>,
    ) -> Result<Arc<SessionHandle>, BridgeError> {
        let config = match config {
            Some(config) => config,
            None => (self.source)()?,
        };
        let client = self.connector.connect(&config.url)?;
        let id = Uuid::now_v7();

        let (authenticated, auth_failure) = match &config.credentials {
            Some(credentials) => match client
                .authenticate(&credentials.identity, &credentials.password)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        session_id = %id,
                        url = %config.url,
                        identity = %credentials.identity,
                        "authenticated as PocketBase superuser"
                    );
                    (true, None)
                }
                Err(err) => {
                    let reason = match err {
                        BridgeError::Authentication { reason } => reason,
                        other => other.to_string(),
                    };
                    tracing::warn!(
                        session_id = %id,
                        url = %config.url,
                        reason = %reason,
                        "PocketBase superuser authentication failed"
                    );
                    (false, Some(reason))
                }
            },
            None => {
                tracing::info!(
                    session_id = %id,
                    url = %config.url,
                    "no admin credentials configured; running anonymously"
                );
                (false, None)
            }
        };

        Ok(Arc::new(SessionHandle {
            id,
            client,
            authenticated,
            auth_failure,
            connected_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBackend, FakeConnector};

    fn credentialed() -> BackendConfig {
        BackendConfig::new("http://pb.test").with_credentials("admin@example.com", "secret")
    }

    #[tokio::test]
    async fn accessor_is_idempotent_without_second_auth() {
        let backend = FakeBackend::new();
        let session = Session::with_connector(
            Some(credentialed()),
            FakeConnector::shared(backend.clone()),
        );

        let first = session.get().await.unwrap();
        let second = session.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.calls().authenticate, 1);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn concurrent_first_access_authenticates_once() {
        let backend = FakeBackend::new();
        let session = Arc::new(Session::with_connector(
            Some(credentialed()),
            FakeConnector::shared(backend.clone()),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.get().await.map(|handle| handle.id) })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(backend.calls().authenticate, 1);
    }

    #[tokio::test]
    async fn anonymous_mode_is_not_an_error() {
        let backend = FakeBackend::new();
        let session = Session::with_connector(
            Some(BackendConfig::new("http://pb.test")),
            FakeConnector::shared(backend.clone()),
        );

        session.get().await.expect("anonymous session");
        assert!(!session.is_authenticated());
        assert_eq!(backend.calls().authenticate, 0);
    }

    #[tokio::test]
    async fn failed_auth_is_reported_once_and_not_retried() {
        let backend = FakeBackend::rejecting("Failed to authenticate.");
        let session = Session::with_connector(
            Some(credentialed()),
            FakeConnector::shared(backend.clone()),
        );

        let err = session.get().await.expect_err("auth rejected");
        assert_eq!(err.code(), "authentication_failed");
        assert!(err.to_string().contains("Failed to authenticate."));

        let handle = session.get().await.expect("client retained");
        assert!(!handle.authenticated);
        assert!(!session.is_authenticated());
        assert_eq!(backend.calls().authenticate, 1);
    }

    #[tokio::test]
    async fn is_authenticated_never_initializes() {
        let backend = FakeBackend::new();
        let connector = FakeConnector::shared(backend.clone());
        let session = Session::with_connector(Some(credentialed()), connector.clone());

        assert!(!session.is_authenticated());
        assert!(!session.is_initialized());
        assert_eq!(connector.connects(), 0);
        assert_eq!(backend.calls().authenticate, 0);
    }

    #[tokio::test]
    async fn reset_clears_flag_and_forces_fresh_init() {
        let backend = FakeBackend::new();
        let session = Session::with_connector(
            Some(credentialed()),
            FakeConnector::shared(backend.clone()),
        );

        let first = session.get().await.unwrap();
        session.reset();
        assert!(!session.is_authenticated());
        assert!(!session.is_initialized());
        assert_eq!(backend.calls().clear_auth, 1);

        let second = session.get().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(session.is_authenticated());
        assert_eq!(backend.calls().authenticate, 2);
    }

    #[tokio::test]
    async fn explicit_config_overrides_session_config() {
        let backend = FakeBackend::new();
        let connector = FakeConnector::shared(backend.clone());
        let session = Session::with_connector(None, connector.clone());

        let handle = session
            .initialize(Some(credentialed()))
            .await
            .expect("explicit config");
        assert!(handle.authenticated);
        assert_eq!(connector.last_url().as_deref(), Some("http://pb.test"));
    }

    #[tokio::test]
    async fn status_reports_uninitialized_without_connecting() {
        let connector = FakeConnector::shared(FakeBackend::new());
        let session = Session::with_connector(Some(credentialed()), connector.clone());

        let status = session.status();
        assert_eq!(status["initialized"], false);
        assert_eq!(status["url"], "http://pb.test");
        assert_eq!(connector.connects(), 0);
    }
}
