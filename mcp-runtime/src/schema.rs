//! Typed argument schemas for tools: validation with defaults before a
//! handler runs, and the JSON Schema advertised through `tools/list`.

use serde_json::{Map, Value, json};

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Integer { min: i64, max: i64 },
    Object,
    ObjectArray,
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    pub non_empty: bool,
    pub default: Option<Value>,
    pub description: &'static str,
}

impl ArgSpec {
    fn of(name: &'static str, ty: ArgType) -> Self {
        Self {
            name,
            ty,
            required: false,
            non_empty: false,
            default: None,
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::of(name, ArgType::String)
    }

    pub fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self::of(name, ArgType::Integer { min, max })
    }

    pub fn object(name: &'static str) -> Self {
        Self::of(name, ArgType::Object)
    }

    pub fn object_array(name: &'static str) -> Self {
        Self::of(name, ArgType::ObjectArray)
    }

    pub fn one_of(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::of(name, ArgType::Enum(values))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reject strings that are empty after trimming.
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn check(&self, value: &Value) -> Result<(), BridgeError> {
        let key = self.name;
        let fail = |message: String| -> Result<(), BridgeError> {
            Err(BridgeError::validation(key, message))
        };
        match self.ty {
            ArgType::String => match value.as_str() {
                Some(text) if self.non_empty && text.trim().is_empty() => {
                    fail(format!("'{key}' must not be empty"))
                }
                Some(_) => Ok(()),
                None => fail(format!("'{key}' must be a string")),
            },
            ArgType::Integer { min, max } => match value.as_i64() {
                Some(n) if n < min || n > max => {
                    fail(format!("'{key}' must be between {min} and {max}"))
                }
                Some(_) => Ok(()),
                None => fail(format!("'{key}' must be an integer")),
            },
            ArgType::Object => match value {
                Value::Object(_) => Ok(()),
                _ => fail(format!("'{key}' must be an object")),
            },
            ArgType::ObjectArray => match value.as_array() {
                Some(items) if items.iter().all(Value::is_object) => Ok(()),
                Some(_) => fail(format!("'{key}' items must be objects")),
                None => fail(format!("'{key}' must be an array")),
            },
            ArgType::Enum(values) => match value.as_str() {
                Some(text) if values.contains(&text) => Ok(()),
                _ => fail(format!("'{key}' must be one of: {}", values.join(", "))),
            },
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = match self.ty {
            ArgType::String => json!({ "type": "string" }),
            ArgType::Integer { min, max } => {
                json!({ "type": "integer", "minimum": min, "maximum": max })
            }
            ArgType::Object => json!({ "type": "object" }),
            ArgType::ObjectArray => json!({ "type": "array", "items": { "type": "object" } }),
            ArgType::Enum(values) => json!({ "type": "string", "enum": values }),
        };
        if self.non_empty {
            schema["minLength"] = json!(1);
        }
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        if !self.description.is_empty() {
            schema["description"] = json!(self.description);
        }
        schema
    }
}

/// Argument schema of one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    pub args: Vec<ArgSpec>,
}

impl ToolSchema {
    pub fn new(args: Vec<ArgSpec>) -> Self {
        Self { args }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate and coerce inbound arguments: apply defaults for missing
    /// optional fields, reject missing required fields and wrong shapes,
    /// drop keys the schema does not declare. `null` counts as missing.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, BridgeError> {
        let mut out = Map::new();
        for spec in &self.args {
            match args.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        return Err(BridgeError::validation(
                            spec.name,
                            format!("Missing required field '{}'", spec.name),
                        ));
                    }
                    if let Some(default) = &spec.default {
                        out.insert(spec.name.to_string(), default.clone());
                    }
                }
                Some(value) => {
                    spec.check(value)?;
                    out.insert(spec.name.to_string(), value.clone());
                }
            }
        }
        Ok(out)
    }

    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .args
            .iter()
            .map(|spec| (spec.name.to_string(), spec.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .args
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
            .collect();
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, BridgeError> {
    match args.get(key) {
        Some(Value::String(v)) => Ok(v.clone()),
        Some(_) => Err(BridgeError::validation(
            key,
            format!("'{key}' must be a string"),
        )),
        None => Err(BridgeError::validation(
            key,
            format!("Missing required field '{key}'"),
        )),
    }
}

/// Optional string that keeps `""` distinct from absent.
pub fn arg_optional_string(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, BridgeError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(BridgeError::validation(
            key,
            format!("'{key}' must be a string"),
        )),
    }
}

pub fn arg_u64(args: &Map<String, Value>, key: &str, default: u64) -> Result<u64, BridgeError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_u64().ok_or_else(|| {
            BridgeError::validation(key, format!("'{key}' must be an unsigned integer"))
        }),
    }
}

pub fn arg_object(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, BridgeError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(BridgeError::validation(
            key,
            format!("'{key}' must be an object"),
        )),
    }
}

pub fn arg_array(args: &Map<String, Value>, key: &str) -> Result<Option<Vec<Value>>, BridgeError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.clone())),
        Some(_) => Err(BridgeError::validation(
            key,
            format!("'{key}' must be an array"),
        )),
    }
}
