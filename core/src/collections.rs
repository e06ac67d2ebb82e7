use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names of the five per-collection API rules, in backend key form.
pub const RULE_KEYS: [&str; 5] = [
    "listRule",
    "viewRule",
    "createRule",
    "updateRule",
    "deleteRule",
];

/// Collection kind accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Base,
    Auth,
    View,
}

impl CollectionType {
    pub const ALL: [&'static str; 3] = ["base", "auth", "view"];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionType::Base => "base",
            CollectionType::Auth => "auth",
            CollectionType::View => "view",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "base" => Some(CollectionType::Base),
            "auth" => Some(CollectionType::Auth),
            "view" => Some(CollectionType::View),
            _ => None,
        }
    }
}

/// The five API rules of a collection.
///
/// `None` means "locked" (superusers only) and serializes as `null`.
/// `Some("")` means "public" (anyone may call the endpoint). The two are
/// different access levels and are never collapsed into each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub list_rule: Option<String>,
    pub view_rule: Option<String>,
    pub create_rule: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

impl RuleSet {
    /// Every rule set to the same expression.
    pub fn uniform(rule: impl Into<String>) -> Self {
        let rule = Some(rule.into());
        Self {
            list_rule: rule.clone(),
            view_rule: rule.clone(),
            create_rule: rule.clone(),
            update_rule: rule.clone(),
            delete_rule: rule,
        }
    }

    /// Every rule set to the empty expression (public access).
    pub fn unlocked() -> Self {
        Self::uniform("")
    }

    /// Every rule absent (superuser-only access).
    pub fn locked() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Option<String>)> {
        RULE_KEYS.into_iter().zip([
            &self.list_rule,
            &self.view_rule,
            &self.create_rule,
            &self.update_rule,
            &self.delete_rule,
        ])
    }

    /// Backend patch payload containing exactly the five rule keys.
    pub fn to_patch(&self) -> Map<String, Value> {
        self.iter()
            .map(|(key, value)| {
                let value = value.clone().map(Value::String).unwrap_or(Value::Null);
                (key.to_string(), value)
            })
            .collect()
    }
}

/// A field definition as stored by the backend. Only the keys the bridge
/// summarizes are typed; the rest is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Compact view of a field used to bound list payload sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl From<&FieldDefinition> for FieldSummary {
    fn from(field: &FieldDefinition) -> Self {
        Self {
            name: field.name.clone(),
            kind: field.kind.clone(),
            required: field.required,
        }
    }
}

/// A backend collection. Unknown keys (indexes, view query, auth options,
/// timestamps) are kept in `extra` so the full object round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(rename = "listRule", default)]
    pub list_rule: Option<String>,
    #[serde(rename = "viewRule", default)]
    pub view_rule: Option<String>,
    #[serde(rename = "createRule", default)]
    pub create_rule: Option<String>,
    #[serde(rename = "updateRule", default)]
    pub update_rule: Option<String>,
    #[serde(rename = "deleteRule", default)]
    pub delete_rule: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Collection {
    pub fn rules(&self) -> RuleSet {
        RuleSet {
            list_rule: self.list_rule.clone(),
            view_rule: self.view_rule.clone(),
            create_rule: self.create_rule.clone(),
            update_rule: self.update_rule.clone(),
            delete_rule: self.delete_rule.clone(),
        }
    }

    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            system: self.system,
            fields: self.fields.iter().map(FieldSummary::from).collect(),
        }
    }
}

/// One entry of a collection listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub system: bool,
    pub fields: Vec<FieldSummary>,
}

/// Confirmed permission state returned after a rule mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRules {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub rules: RuleSet,
}

impl From<&Collection> for CollectionRules {
    fn from(collection: &Collection) -> Self {
        Self {
            id: collection.id.clone(),
            name: collection.name.clone(),
            rules: collection.rules(),
        }
    }
}

/// Paginated response as returned by the backend list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub items: Vec<T>,
}

impl<T> ListPage<T> {
    /// Slice `all` into the requested 1-based page.
    pub fn paginate(all: Vec<T>, page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let page = page.max(1);
        let total_items = all.len() as u64;
        let total_pages = total_items.div_ceil(per_page);
        let skip = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
        let take = usize::try_from(per_page).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(skip).take(take).collect();
        Self {
            page,
            per_page,
            total_items,
            total_pages,
            items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListPage<U> {
        ListPage {
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
