//! Per-tool handlers: map validated arguments onto backend calls and reduce
//! the backend response to what the caller asked for.

use pbmcp_core::collections::{
    Collection, CollectionRules, CollectionType, FieldSummary, RULE_KEYS, RuleSet,
};
use serde_json::{Map, Value, json};

use crate::backend::Backend;
use crate::error::BridgeError;
use crate::registry::{DEFAULT_PER_PAGE, ToolKind};
use crate::schema::{arg_array, arg_object, arg_optional_string, arg_u64, required_string};
use crate::session::Session;

/// Option keys that would silently override an explicit argument.
const RESERVED_OPTION_KEYS: [&str; 3] = ["name", "type", "fields"];

pub struct ToolContext<'a> {
    pub session: &'a Session,
    /// Present only for privileged tools that passed the gate.
    pub client: Option<&'a dyn Backend>,
}

impl<'a> ToolContext<'a> {
    fn client(&self, action: &str) -> Result<&'a dyn Backend, BridgeError> {
        self.client
            .ok_or_else(|| BridgeError::unauthenticated(action))
    }
}

pub async fn execute(
    kind: ToolKind,
    ctx: &ToolContext<'_>,
    args: &Map<String, Value>,
) -> Result<Value, BridgeError> {
    match kind {
        ToolKind::Ping => Ok(Value::String("pong".to_string())),
        ToolKind::SessionStatus => Ok(ctx.session.status()),
        ToolKind::ListCollections => {
            list_collections(ctx.client("Listing collections")?, args).await
        }
        ToolKind::GetCollection => {
            get_collection(ctx.client("Reading collection schema")?, args).await
        }
        ToolKind::CreateCollection => {
            create_collection(ctx.client("Creating a collection")?, args).await
        }
        ToolKind::UpdateCollectionFields => {
            update_collection_fields(ctx.client("Modifying a collection")?, args).await
        }
        ToolKind::SetCollectionPermissions => {
            let rule = required_string(args, "rule")?;
            let message_rule = rule.clone();
            apply_rules(
                ctx.client("Changing collection rules")?,
                args,
                RuleSet::uniform(rule),
                move |c| {
                    format!(
                        "API rules of collection \"{}\" ({}) were all set to: {message_rule}",
                        c.name, c.id
                    )
                },
            )
            .await
        }
        ToolKind::UnlockCollectionPermissions => {
            apply_rules(
                ctx.client("Changing collection rules")?,
                args,
                RuleSet::unlocked(),
                |c| {
                    format!(
                        "API rules of collection \"{}\" ({}) were cleared; all endpoints are now public.",
                        c.name, c.id
                    )
                },
            )
            .await
        }
    }
}

async fn list_collections(
    client: &dyn Backend,
    args: &Map<String, Value>,
) -> Result<Value, BridgeError> {
    let page = arg_u64(args, "page", 1)?;
    let per_page = arg_u64(args, "perPage", DEFAULT_PER_PAGE)?;
    let filter = arg_optional_string(args, "filter")?.filter(|f| !f.trim().is_empty());

    let result = client
        .list_collections(page, per_page, filter.as_deref())
        .await?;
    Ok(json!(result.map(|collection| collection.summary())))
}

async fn get_collection(
    client: &dyn Backend,
    args: &Map<String, Value>,
) -> Result<Value, BridgeError> {
    let target = required_string(args, "collectionIdOrName")?;
    let collection = client.get_collection(&target).await?;
    to_json(&collection)
}

/// Resolve by id or name before any mutation.
async fn resolve(client: &dyn Backend, target: &str) -> Result<Collection, BridgeError> {
    client.get_collection(target).await.map_err(|err| match err {
        BridgeError::NotFound { message } => BridgeError::not_found(format!(
            "Collection '{target}' does not exist ({message})"
        )),
        other => other,
    })
}

async fn apply_rules(
    client: &dyn Backend,
    args: &Map<String, Value>,
    rules: RuleSet,
    message: impl FnOnce(&Collection) -> String,
) -> Result<Value, BridgeError> {
    let target = required_string(args, "collectionIdOrName")?;
    let collection = resolve(client, &target).await?;

    let updated = client
        .update_collection(&collection.id, rules.to_patch())
        .await?;

    Ok(json!({
        "success": true,
        "message": message(&collection),
        "collection": CollectionRules::from(&updated),
    }))
}

async fn update_collection_fields(
    client: &dyn Backend,
    args: &Map<String, Value>,
) -> Result<Value, BridgeError> {
    let target = required_string(args, "collectionIdOrName")?;
    let fields = arg_array(args, "fields")?.unwrap_or_default();
    let collection = resolve(client, &target).await?;

    let mut patch = Map::new();
    patch.insert("fields".to_string(), Value::Array(fields));
    let updated = client.update_collection(&collection.id, patch).await?;

    Ok(json!({
        "success": true,
        "message": format!("Fields of collection \"{}\" were updated.", collection.name),
        "collection": {
            "id": updated.id,
            "name": updated.name,
            "fields": updated.fields,
        }
    }))
}

async fn create_collection(
    client: &dyn Backend,
    args: &Map<String, Value>,
) -> Result<Value, BridgeError> {
    let payload = build_create_payload(args)?;
    let name = required_string(args, "name")?;

    match client.get_collection(&name).await {
        Ok(existing) => {
            return Err(BridgeError::validation(
                "name",
                format!(
                    "Collection \"{}\" already exists ({})",
                    existing.name, existing.id
                ),
            ));
        }
        Err(BridgeError::NotFound { .. }) => {}
        Err(other) => return Err(other),
    }

    let created = client.create_collection(payload).await?;

    let mut summary = Map::new();
    summary.insert("id".to_string(), json!(created.id));
    summary.insert("name".to_string(), json!(created.name));
    summary.insert("type".to_string(), json!(created.kind));
    summary.insert("fields".to_string(), json!(field_summaries(&created)));
    summary.extend(created.rules().to_patch());

    Ok(json!({
        "success": true,
        "message": format!("Collection \"{name}\" was created."),
        "collection": summary,
    }))
}

/// Creation payload: explicit arguments, absent rules as `null` (locked),
/// then the passthrough options.
fn build_create_payload(args: &Map<String, Value>) -> Result<Map<String, Value>, BridgeError> {
    let name = required_string(args, "name")?;
    let kind = arg_optional_string(args, "type")?.unwrap_or_else(|| "base".to_string());
    let kind = CollectionType::parse(&kind).ok_or_else(|| {
        BridgeError::validation(
            "type",
            format!("'type' must be one of: {}", CollectionType::ALL.join(", ")),
        )
    })?;
    let fields = arg_array(args, "fields")?.unwrap_or_default();
    let options = arg_object(args, "collectionOptions")?.unwrap_or_default();

    for key in options.keys() {
        if RESERVED_OPTION_KEYS.contains(&key.as_str()) || RULE_KEYS.contains(&key.as_str()) {
            return Err(BridgeError::validation(
                "collectionOptions",
                format!("'collectionOptions.{key}' conflicts with an explicit argument; pass it directly"),
            ));
        }
    }
    if kind == CollectionType::View {
        let has_query = options
            .get("viewQuery")
            .and_then(Value::as_str)
            .is_some_and(|query| !query.trim().is_empty());
        if !has_query {
            return Err(BridgeError::validation(
                "collectionOptions",
                "A view collection requires 'collectionOptions.viewQuery'",
            ));
        }
    }

    let mut payload = Map::new();
    payload.insert("name".to_string(), json!(name));
    payload.insert("type".to_string(), json!(kind.as_str()));
    payload.insert("fields".to_string(), Value::Array(fields));
    payload.extend(RuleSet::locked().to_patch());
    for key in RULE_KEYS {
        if let Some(rule) = arg_optional_string(args, key)? {
            payload.insert(key.to_string(), Value::String(rule));
        }
    }
    payload.extend(options);
    Ok(payload)
}

fn field_summaries(collection: &Collection) -> Vec<FieldSummary> {
    collection.fields.iter().map(FieldSummary::from).collect()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, BridgeError> {
    serde_json::to_value(value)
        .map_err(|e| BridgeError::backend(format!("Failed to encode backend object: {e}")))
}
