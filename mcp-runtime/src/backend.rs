use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pbmcp_core::collections::{Collection, ListPage};
use reqwest::{Method, Url};
use serde_json::{Map, Value, json};

use crate::error::BridgeError;

const SUPERUSERS_COLLECTION: &str = "_superusers";

/// Administrative API of the backend service. One instance is bound to one
/// base URL and carries its own auth token.
#[async_trait]
pub trait Backend: Send + Sync {
    fn base_url(&self) -> &str;

    /// Exchange superuser credentials for a session token kept by the client.
    async fn authenticate(&self, identity: &str, password: &str) -> Result<(), BridgeError>;

    async fn list_collections(
        &self,
        page: u64,
        per_page: u64,
        filter: Option<&str>,
    ) -> Result<ListPage<Collection>, BridgeError>;

    async fn get_collection(&self, id_or_name: &str) -> Result<Collection, BridgeError>;

    async fn create_collection(&self, payload: Map<String, Value>)
    -> Result<Collection, BridgeError>;

    async fn update_collection(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Collection, BridgeError>;

    /// Drop the local auth token. No network call.
    fn clear_auth(&self);
}

/// Builds a [`Backend`] bound to a service URL.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn Backend>, BridgeError>;
}

/// Connector producing HTTP clients for a PocketBase server.
#[derive(Debug, Default, Clone, Copy)]
pub struct PocketBaseConnector;

impl BackendConnector for PocketBaseConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn Backend>, BridgeError> {
        Ok(Arc::new(PocketBaseClient::new(url)?))
    }
}

#[derive(Debug)]
pub struct PocketBaseClient {
    url: String,
    base: Url,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl PocketBaseClient {
    pub fn new(url: &str) -> Result<Self, BridgeError> {
        let base = Url::parse(url).map_err(|e| {
            BridgeError::configuration(format!("Invalid PocketBase URL '{url}': {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(BridgeError::configuration(format!(
                "Invalid PocketBase URL '{url}': not a base URL"
            )));
        }
        Ok(Self {
            url: url.to_string(),
            base,
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<(u16, Value), BridgeError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = self.token() {
            request = request.header("Authorization", token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            BridgeError::backend(format!("Failed to reach PocketBase at {}: {e}", self.url))
        })?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            BridgeError::backend(format!("Failed to read PocketBase response body: {e}"))
        })?;
        Ok((status, parse_response_body(&bytes)))
    }

    async fn collection_call(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        target: &str,
    ) -> Result<Collection, BridgeError> {
        let (status, body) = self.send(method, url, body).await?;
        if !is_success(status) {
            return Err(classify_error(status, &body, target));
        }
        decode(body)
    }
}

#[async_trait]
impl Backend for PocketBaseClient {
    fn base_url(&self) -> &str {
        &self.url
    }

    async fn authenticate(&self, identity: &str, password: &str) -> Result<(), BridgeError> {
        let url = self.endpoint(&[
            "api",
            "collections",
            SUPERUSERS_COLLECTION,
            "auth-with-password",
        ]);
        let (status, body) = self
            .send(
                Method::POST,
                url,
                Some(json!({ "identity": identity, "password": password })),
            )
            .await?;
        if !is_success(status) {
            return Err(BridgeError::authentication(backend_message(status, &body)));
        }
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| BridgeError::authentication("response did not contain a token"))?;
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    async fn list_collections(
        &self,
        page: u64,
        per_page: u64,
        filter: Option<&str>,
    ) -> Result<ListPage<Collection>, BridgeError> {
        let mut url = self.endpoint(&["api", "collections"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            query.append_pair("perPage", &per_page.to_string());
            if let Some(filter) = filter {
                query.append_pair("filter", filter);
            }
        }
        let (status, body) = self.send(Method::GET, url, None).await?;
        if !is_success(status) {
            return Err(classify_error(status, &body, "collections"));
        }
        decode(body)
    }

    async fn get_collection(&self, id_or_name: &str) -> Result<Collection, BridgeError> {
        let url = self.endpoint(&["api", "collections", id_or_name]);
        self.collection_call(Method::GET, url, None, id_or_name)
            .await
    }

    async fn create_collection(
        &self,
        payload: Map<String, Value>,
    ) -> Result<Collection, BridgeError> {
        let target = payload
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("collection")
            .to_string();
        let url = self.endpoint(&["api", "collections"]);
        self.collection_call(Method::POST, url, Some(Value::Object(payload)), &target)
            .await
    }

    async fn update_collection(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Collection, BridgeError> {
        let url = self.endpoint(&["api", "collections", id]);
        self.collection_call(Method::PATCH, url, Some(Value::Object(patch)), id)
            .await
    }

    fn clear_auth(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

fn parse_response_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, BridgeError> {
    serde_json::from_value(body)
        .map_err(|e| BridgeError::backend(format!("Unexpected PocketBase response shape: {e}")))
}

fn backend_message(status: u16, body: &Value) -> String {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("PocketBase responded with HTTP {status}")),
        Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => format!("PocketBase responded with HTTP {status}"),
    }
}

/// Map a non-2xx backend response onto the error taxonomy.
fn classify_error(status: u16, body: &Value, target: &str) -> BridgeError {
    let message = backend_message(status, body);
    if status == 404 {
        return BridgeError::not_found(format!("Collection '{target}' not found: {message}"));
    }
    let details = body
        .get("data")
        .filter(|data| data.as_object().is_some_and(|map| !map.is_empty()))
        .cloned();
    BridgeError::Backend {
        message,
        status: Some(status),
        details,
    }
}
