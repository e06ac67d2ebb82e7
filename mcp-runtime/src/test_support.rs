//! In-memory backend used by unit tests. Counts every call so tests can
//! assert that gated tools never reach the backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pbmcp_core::collections::{Collection, ListPage};
use serde_json::{Map, Value, json};

use crate::backend::{Backend, BackendConnector};
use crate::error::BridgeError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub authenticate: usize,
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub clear_auth: usize,
}

impl CallCounts {
    /// Calls that would have hit the network.
    pub fn network(&self) -> usize {
        self.authenticate + self.list + self.get + self.create + self.update
    }
}

#[derive(Default)]
struct FakeState {
    collections: Mutex<Vec<Collection>>,
    calls: Mutex<CallCounts>,
    reject_auth: Option<String>,
    fail_next: Mutex<Option<BridgeError>>,
    last_patch: Mutex<Option<Map<String, Value>>>,
    last_create: Mutex<Option<Map<String, Value>>>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            state: Arc::new(FakeState {
                reject_auth: Some(reason.to_string()),
                ..FakeState::default()
            }),
        }
    }

    /// Seed `count` base collections named `collection_01`, `collection_02`, ...
    pub fn with_collections(self, count: usize) -> Self {
        for n in 1..=count {
            self.insert(sample_collection(
                &format!("pbc_{n:02}"),
                &format!("collection_{n:02}"),
            ));
        }
        self
    }

    pub fn insert(&self, collection: Collection) {
        self.state.collections.lock().unwrap().push(collection);
    }

    pub fn collection(&self, id_or_name: &str) -> Option<Collection> {
        self.state
            .collections
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
            .cloned()
    }

    pub fn calls(&self) -> CallCounts {
        *self.state.calls.lock().unwrap()
    }

    pub fn fail_next(&self, err: BridgeError) {
        *self.state.fail_next.lock().unwrap() = Some(err);
    }

    pub fn last_patch(&self) -> Option<Map<String, Value>> {
        self.state.last_patch.lock().unwrap().clone()
    }

    pub fn last_create(&self) -> Option<Map<String, Value>> {
        self.state.last_create.lock().unwrap().clone()
    }

    fn record(&self, bump: impl FnOnce(&mut CallCounts)) -> Result<(), BridgeError> {
        bump(&mut self.state.calls.lock().unwrap());
        match self.state.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn sample_collection(id: &str, name: &str) -> Collection {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "type": "base",
        "system": false,
        "fields": [
            { "name": "id", "type": "text", "required": true, "system": true },
            { "name": "title", "type": "text", "required": false }
        ],
        "listRule": null,
        "viewRule": null,
        "createRule": null,
        "updateRule": null,
        "deleteRule": null,
        "indexes": []
    }))
    .expect("sample collection")
}

fn not_found() -> BridgeError {
    BridgeError::not_found("The requested resource wasn't found.")
}

#[async_trait]
impl Backend for FakeBackend {
    fn base_url(&self) -> &str {
        "http://pb.test"
    }

    async fn authenticate(&self, _identity: &str, _password: &str) -> Result<(), BridgeError> {
        self.record(|c| c.authenticate += 1)?;
        match &self.state.reject_auth {
            Some(reason) => Err(BridgeError::authentication(reason.clone())),
            None => Ok(()),
        }
    }

    async fn list_collections(
        &self,
        page: u64,
        per_page: u64,
        filter: Option<&str>,
    ) -> Result<ListPage<Collection>, BridgeError> {
        self.record(|c| c.list += 1)?;
        let all: Vec<Collection> = self
            .state
            .collections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| match filter {
                // Only the `name~"x"` shape is understood here.
                Some(expr) => expr
                    .strip_prefix("name~")
                    .map(|needle| c.name.contains(needle.trim_matches('"')))
                    .unwrap_or(true),
                None => true,
            })
            .cloned()
            .collect();
        Ok(ListPage::paginate(all, page, per_page))
    }

    async fn get_collection(&self, id_or_name: &str) -> Result<Collection, BridgeError> {
        self.record(|c| c.get += 1)?;
        self.collection(id_or_name).ok_or_else(not_found)
    }

    async fn create_collection(
        &self,
        payload: Map<String, Value>,
    ) -> Result<Collection, BridgeError> {
        self.record(|c| c.create += 1)?;
        *self.state.last_create.lock().unwrap() = Some(payload.clone());

        let mut collections = self.state.collections.lock().unwrap();
        let name = payload.get("name").and_then(Value::as_str).unwrap_or_default();
        if collections.iter().any(|c| c.name == name) {
            return Err(BridgeError::Backend {
                message: "Failed to create record.".to_string(),
                status: Some(400),
                details: Some(json!({ "name": { "code": "validation_collection_name_exists" } })),
            });
        }
        let mut object = payload;
        object.insert(
            "id".to_string(),
            json!(format!("pbc_new_{}", collections.len() + 1)),
        );
        object.entry("system").or_insert(json!(false));
        let created: Collection = serde_json::from_value(Value::Object(object))
            .map_err(|e| BridgeError::backend(e.to_string()))?;
        collections.push(created.clone());
        Ok(created)
    }

    async fn update_collection(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Collection, BridgeError> {
        self.record(|c| c.update += 1)?;
        *self.state.last_patch.lock().unwrap() = Some(patch.clone());

        let mut collections = self.state.collections.lock().unwrap();
        let slot = collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(not_found)?;
        let mut object = match serde_json::to_value(&*slot) {
            Ok(Value::Object(map)) => map,
            _ => return Err(BridgeError::backend("unserializable collection")),
        };
        object.extend(patch);
        *slot = serde_json::from_value(Value::Object(object))
            .map_err(|e| BridgeError::backend(e.to_string()))?;
        Ok(slot.clone())
    }

    fn clear_auth(&self) {
        self.state.calls.lock().unwrap().clear_auth += 1;
    }
}

/// Connector that always hands out the same fake backend.
pub struct FakeConnector {
    backend: FakeBackend,
    connects: Mutex<usize>,
    last_url: Mutex<Option<String>>,
}

impl FakeConnector {
    pub fn shared(backend: FakeBackend) -> Arc<Self> {
        Arc::new(Self {
            backend,
            connects: Mutex::new(0),
            last_url: Mutex::new(None),
        })
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().unwrap().clone()
    }
}

impl BackendConnector for FakeConnector {
    fn connect(&self, url: &str) -> Result<Arc<dyn Backend>, BridgeError> {
        *self.connects.lock().unwrap() += 1;
        *self.last_url.lock().unwrap() = Some(url.to_string());
        Ok(Arc::new(self.backend.clone()))
    }
}
