use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::Envelope;
use crate::error::BridgeError;
use crate::gate;
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::session::{Session, SessionHandle};
use crate::tools::{self, ToolContext};

/// Failures reported by the protocol layer rather than inside an envelope.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Routes one tool call to exactly one handler and always produces exactly
/// one envelope for known tools.
pub struct Dispatcher {
    session: Arc<Session>,
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(session: Arc<Session>, registry: ToolRegistry) -> Self {
        Self { session, registry }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Connect (and authenticate) up front instead of on the first call.
    pub async fn ensure_initialized(&self) -> Result<Arc<SessionHandle>, BridgeError> {
        self.session.get().await
    }

    pub async fn call(&self, name: &str, args: &Map<String, Value>) -> Result<Envelope, DispatchError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let result = self.run(tool, args).await;
        match &result {
            Ok(_) => tracing::debug!(tool = name, "tool call completed"),
            Err(err) => tracing::warn!(
                tool = name,
                error = err.code(),
                message = %err,
                "tool call failed"
            ),
        }
        Ok(Envelope::from_result(&result))
    }

    async fn run(
        &self,
        tool: &ToolDescriptor,
        args: &Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let args = tool.schema.validate(args)?;

        let handle = if tool.privileged {
            let handle = self.session.get().await?;
            gate::require_admin(&self.session, tool.action)?;
            Some(handle)
        } else {
            None
        };

        let ctx = ToolContext {
            session: &self.session,
            client: handle.as_ref().map(|handle| handle.client.as_ref()),
        };
        tools::execute(tool.kind, &ctx, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::registry::tool_definitions;
    use crate::test_support::{FakeBackend, FakeConnector, sample_collection};
    use serde_json::json;

    fn dispatcher(config: BackendConfig, backend: &FakeBackend) -> Dispatcher {
        let session = Session::with_connector(Some(config), FakeConnector::shared(backend.clone()));
        Dispatcher::new(Arc::new(session), ToolRegistry::builtin().unwrap())
    }

    fn admin() -> BackendConfig {
        BackendConfig::new("http://pb.test").with_credentials("admin@example.com", "secret")
    }

    fn anonymous() -> BackendConfig {
        BackendConfig::new("http://pb.test")
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn valid_args(name: &str) -> Map<String, Value> {
        args(match name {
            "list_collections" => json!({}),
            "create_collection" => json!({ "name": "fresh" }),
            "update_collection_fields" => {
                json!({ "collectionIdOrName": "posts", "fields": [] })
            }
            "set_collection_permissions" => {
                json!({ "collectionIdOrName": "posts", "rule": "" })
            }
            _ => json!({ "collectionIdOrName": "posts" }),
        })
    }

    #[tokio::test]
    async fn privileged_tools_are_gated_without_backend_calls() {
        for tool in tool_definitions().into_iter().filter(|t| t.privileged) {
            let backend = FakeBackend::new();
            backend.insert(sample_collection("pbc_1", "posts"));
            let dispatcher = dispatcher(anonymous(), &backend);

            let envelope = dispatcher
                .call(tool.name, &valid_args(tool.name))
                .await
                .unwrap();

            assert!(envelope.is_error(), "{}", tool.name);
            assert_eq!(envelope.payload().unwrap()["error"], "unauthenticated");
            assert_eq!(backend.calls().network(), 0, "{}", tool.name);
        }
    }

    #[tokio::test]
    async fn every_tool_yields_one_envelope_with_matching_error_flag() {
        for tool in tool_definitions() {
            let backend = FakeBackend::new();
            backend.insert(sample_collection("pbc_1", "posts"));
            let dispatcher = dispatcher(admin(), &backend);

            let ok = dispatcher
                .call(tool.name, &valid_args(tool.name))
                .await
                .unwrap();
            assert!(!ok.is_error(), "{} should succeed", tool.name);
            assert_eq!(ok.content.len(), 1);

            if tool.privileged {
                backend.fail_next(BridgeError::backend("upstream exploded"));
                let failed = dispatcher
                    .call(tool.name, &valid_args(tool.name))
                    .await
                    .unwrap();
                assert!(failed.is_error(), "{} should fail", tool.name);
                let payload = failed.payload().unwrap();
                assert_eq!(payload["error"], "backend_request_failed");
                assert_eq!(payload["message"], "upstream exploded");
            }
        }
    }

    #[tokio::test]
    async fn schema_violation_short_circuits_before_session() {
        let backend = FakeBackend::new();
        let dispatcher = dispatcher(admin(), &backend);

        let envelope = dispatcher
            .call("get_collection", &Map::new())
            .await
            .unwrap();
        let payload = envelope.payload().unwrap();
        assert_eq!(payload["error"], "validation_failed");
        assert_eq!(payload["field"], "collectionIdOrName");
        assert_eq!(backend.calls().network(), 0);
        assert!(!dispatcher.session().is_initialized());
    }

    #[tokio::test]
    async fn unknown_tool_is_a_dispatch_error() {
        let backend = FakeBackend::new();
        let dispatcher = dispatcher(admin(), &backend);
        let err = dispatcher.call("drop_database", &Map::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTool(name) if name == "drop_database"));
    }

    #[tokio::test]
    async fn rejected_credentials_then_gate() {
        let backend = FakeBackend::rejecting("Failed to authenticate.");
        let session = Session::with_connector(Some(admin()), FakeConnector::shared(backend.clone()));
        let dispatcher = Dispatcher::new(Arc::new(session), ToolRegistry::builtin().unwrap());

        let first = dispatcher.call("list_collections", &Map::new()).await.unwrap();
        let payload = first.payload().unwrap();
        assert_eq!(payload["error"], "authentication_failed");
        assert!(
            payload["message"]
                .as_str()
                .unwrap()
                .contains("Failed to authenticate.")
        );

        let second = dispatcher.call("list_collections", &Map::new()).await.unwrap();
        let payload = second.payload().unwrap();
        assert_eq!(payload["error"], "unauthenticated");
        assert!(
            payload["message"]
                .as_str()
                .unwrap()
                .contains("Failed to authenticate.")
        );
        assert_eq!(backend.calls().authenticate, 1);
        assert_eq!(backend.calls().list, 0);
    }

    #[tokio::test]
    async fn startup_auth_failure_reason_reaches_later_calls() {
        let backend = FakeBackend::rejecting("Failed to authenticate.");
        let dispatcher = dispatcher(admin(), &backend);

        let err = dispatcher.ensure_initialized().await.unwrap_err();
        assert_eq!(err.code(), "authentication_failed");

        let envelope = dispatcher.call("list_collections", &Map::new()).await.unwrap();
        assert!(envelope.is_error());
        let payload = envelope.payload().unwrap();
        assert_eq!(payload["error"], "unauthenticated");
        let message = payload["message"].as_str().unwrap();
        assert!(message.contains("credentials were rejected"), "{message}");
        assert!(message.contains("Failed to authenticate."), "{message}");
        assert_eq!(backend.calls().authenticate, 1);
        assert_eq!(backend.calls().list, 0);
    }

    #[tokio::test]
    async fn missing_url_is_reported_as_configuration_error() {
        let backend = FakeBackend::new();
        let session = Session::with_source(
            || BackendConfig::from_parts(None, None, None),
            FakeConnector::shared(backend.clone()),
        );
        let dispatcher = Dispatcher::new(Arc::new(session), ToolRegistry::builtin().unwrap());

        let envelope = dispatcher.call("get_collection", &valid_args("get_collection")).await.unwrap();
        assert_eq!(envelope.payload().unwrap()["error"], "configuration_error");
        assert_eq!(backend.calls().network(), 0);
    }

    #[tokio::test]
    async fn reset_then_call_reauthenticates() {
        let backend = FakeBackend::new();
        backend.insert(sample_collection("pbc_1", "posts"));
        let dispatcher = dispatcher(admin(), &backend);

        dispatcher.ensure_initialized().await.unwrap();
        dispatcher.session().reset();
        assert!(!dispatcher.session().is_authenticated());

        let envelope = dispatcher
            .call("get_collection", &valid_args("get_collection"))
            .await
            .unwrap();
        assert!(!envelope.is_error());
        assert_eq!(backend.calls().authenticate, 2);
    }

    #[tokio::test]
    async fn ping_and_status_do_not_connect() {
        let backend = FakeBackend::new();
        let dispatcher = dispatcher(admin(), &backend);

        let pong = dispatcher.call("ping", &Map::new()).await.unwrap();
        assert_eq!(pong.content[0].text, "pong");

        let status = dispatcher.call("session_status", &Map::new()).await.unwrap();
        assert_eq!(status.payload().unwrap()["initialized"], false);
        assert_eq!(backend.calls().network(), 0);
    }
}
