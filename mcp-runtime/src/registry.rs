use std::collections::HashSet;

use pbmcp_core::collections::CollectionType;
use serde_json::{Value, json};

use crate::error::BridgeError;
use crate::schema::{ArgSpec, ToolSchema};

pub const MAX_PER_PAGE: i64 = 500;
pub const DEFAULT_PER_PAGE: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Ping,
    SessionStatus,
    ListCollections,
    GetCollection,
    CreateCollection,
    UpdateCollectionFields,
    SetCollectionPermissions,
    UnlockCollectionPermissions,
}

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ToolSchema,
    /// Requires an authenticated superuser session.
    pub privileged: bool,
    /// Subject used in gate rejections, e.g. "Listing collections".
    pub action: &'static str,
}

/// Fixed set of tools, unique by name.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, BridgeError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name) {
                return Err(BridgeError::configuration(format!(
                    "duplicate tool name '{}'",
                    tool.name
                )));
            }
        }
        Ok(Self { tools })
    }

    pub fn builtin() -> Result<Self, BridgeError> {
        Self::new(tool_definitions())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.schema.input_schema(),
                })
            })
            .collect();
        json!({ "tools": tools })
    }
}

fn collection_target() -> ArgSpec {
    ArgSpec::string("collectionIdOrName")
        .required()
        .non_empty()
        .describe("Collection ID or name")
}

fn rule_arg(name: &'static str, description: &'static str) -> ArgSpec {
    ArgSpec::string(name).describe(description)
}

pub fn tool_definitions() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            kind: ToolKind::Ping,
            name: "ping",
            description: "Simple health check",
            schema: ToolSchema::empty(),
            privileged: false,
            action: "Ping",
        },
        ToolDescriptor {
            kind: ToolKind::SessionStatus,
            name: "session_status",
            description: "Report whether the bridge is connected to PocketBase and authenticated as a superuser. Never connects or authenticates by itself.",
            schema: ToolSchema::empty(),
            privileged: false,
            action: "Reading session status",
        },
        ToolDescriptor {
            kind: ToolKind::ListCollections,
            name: "list_collections",
            description: "List all collections (tables/schemas) in the PocketBase database. Use this to discover available data structures, understand the database schema, or find specific collections by name. Returns collection names, types, and field summaries. Requires admin authentication.",
            schema: ToolSchema::new(vec![
                ArgSpec::integer("page", 1, i64::MAX)
                    .default(json!(1))
                    .describe("Page number, defaults to 1"),
                ArgSpec::integer("perPage", 1, MAX_PER_PAGE)
                    .default(json!(DEFAULT_PER_PAGE))
                    .describe("Items per page, defaults to 50"),
                ArgSpec::string("filter")
                    .describe("Filter expression, for example: name~\"user\""),
            ]),
            privileged: true,
            action: "Listing collections",
        },
        ToolDescriptor {
            kind: ToolKind::GetCollection,
            name: "get_collection",
            description: "Get detailed schema information for a specific PocketBase collection. Use this to understand the complete field definitions, data types, validation rules, and API access rules of a collection before querying or modifying its records. Requires admin authentication.",
            schema: ToolSchema::new(vec![collection_target()]),
            privileged: true,
            action: "Reading collection schema",
        },
        ToolDescriptor {
            kind: ToolKind::CreateCollection,
            name: "create_collection",
            description: "Create a new PocketBase collection. You can specify the name, type (base, auth, view), initial fields, and API rules. Rules left out stay locked (superusers only), which is different from an empty rule (public). Requires admin authentication.",
            schema: ToolSchema::new(vec![
                ArgSpec::string("name")
                    .required()
                    .non_empty()
                    .describe("Collection name"),
                ArgSpec::one_of("type", &CollectionType::ALL)
                    .default(json!("base"))
                    .describe("Collection type"),
                ArgSpec::object_array("fields").describe("Initial field definitions"),
                rule_arg("listRule", "List API rule"),
                rule_arg("viewRule", "View API rule"),
                rule_arg("createRule", "Create API rule"),
                rule_arg("updateRule", "Update API rule"),
                rule_arg("deleteRule", "Delete API rule"),
                ArgSpec::object("collectionOptions").describe(
                    "Extra collection options merged into the payload (for example viewQuery, indexes, authRule, passwordAuth)",
                ),
            ]),
            privileged: true,
            action: "Creating a collection",
        },
        ToolDescriptor {
            kind: ToolKind::UpdateCollectionFields,
            name: "update_collection_fields",
            description: "Update or add fields to an existing PocketBase collection. This tool replaces the entire fields array, so include every field you want to keep. Requires admin authentication.",
            schema: ToolSchema::new(vec![
                collection_target(),
                ArgSpec::object_array("fields")
                    .required()
                    .describe("Complete list of field definitions"),
            ]),
            privileged: true,
            action: "Modifying a collection",
        },
        ToolDescriptor {
            kind: ToolKind::SetCollectionPermissions,
            name: "set_collection_permissions",
            description: "Set uniform API permission rules (list, view, create, update, delete) for a specific PocketBase collection to a single provided rule string. Use this to quickly apply a common access control policy across all API endpoints of a collection. Requires admin authentication.",
            schema: ToolSchema::new(vec![
                collection_target(),
                ArgSpec::string("rule").required().describe(
                    "Rule expression to apply, for example: @request.auth.id != \"\"",
                ),
            ]),
            privileged: true,
            action: "Changing collection rules",
        },
        ToolDescriptor {
            kind: ToolKind::UnlockCollectionPermissions,
            name: "unlock_collection_permissions",
            description: "Remove all API permission rules (list, view, create, update, delete) for a specific PocketBase collection by setting them to an empty string. This makes the collection APIs public. Use this for rapid development and prototyping. Requires admin authentication.",
            schema: ToolSchema::new(vec![collection_target()]),
            privileged: true,
            action: "Changing collection rules",
        },
    ]
}
