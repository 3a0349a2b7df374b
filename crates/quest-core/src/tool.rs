use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::QuestError;

/// Description of a tool as advertised to the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Stable name, e.g. "render_page", "run_code".
    pub name: String,
    /// Human-readable description for the provider.
    pub description: String,
    /// JSON Schema of the parameters object.
    pub parameters: Value,
}

/// Accepted JSON shape of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    StringList,
    Any,
}

impl ArgKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ArgKind::String => value.is_string(),
            ArgKind::Integer => value.is_i64() || value.is_u64(),
            ArgKind::Number => value.is_number(),
            ArgKind::Boolean => value.is_boolean(),
            ArgKind::Object => value.is_object(),
            ArgKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ArgKind::Any => true,
        }
    }

    fn json_type(self) -> Value {
        match self {
            ArgKind::String => json!({ "type": "string" }),
            ArgKind::Integer => json!({ "type": "integer" }),
            ArgKind::Number => json!({ "type": "number" }),
            ArgKind::Boolean => json!({ "type": "boolean" }),
            ArgKind::Object => json!({ "type": "object" }),
            ArgKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            ArgKind::Any => json!({}),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ArgKind::String => "string",
            ArgKind::Integer => "integer",
            ArgKind::Number => "number",
            ArgKind::Boolean => "boolean",
            ArgKind::Object => "object",
            ArgKind::StringList => "array of strings",
            ArgKind::Any => "any value",
        }
    }
}

#[derive(Debug, Clone)]
struct ArgField {
    name: String,
    kind: ArgKind,
    required: bool,
    description: String,
}

/// Strict argument-shape validator for a tool.
///
/// Arguments must be a JSON object; every required field must be present with the
/// declared kind, optional fields must match their kind when present, and keys that
/// are not declared are rejected. Nothing is coerced.
#[derive(Debug, Clone, Default)]
pub struct ArgSchema {
    fields: Vec<ArgField>,
}

impl ArgSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, kind: ArgKind, description: &str) -> Self {
        self.fields.push(ArgField {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        });
        self
    }

    pub fn optional(mut self, name: &str, kind: ArgKind, description: &str) -> Self {
        self.fields.push(ArgField {
            name: name.to_string(),
            kind,
            required: false,
            description: description.to_string(),
        });
        self
    }

    /// Check `args` against the schema. The error string is meant for the provider.
    pub fn validate(&self, args: &Value) -> std::result::Result<(), String> {
        let obj = args
            .as_object()
            .ok_or_else(|| format!("arguments must be a JSON object, got {}", type_name(args)))?;

        for key in obj.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                return Err(format!("unexpected argument '{key}'"));
            }
        }

        for field in &self.fields {
            match obj.get(&field.name) {
                None if field.required => {
                    return Err(format!("missing required argument '{}'", field.name));
                }
                None => {}
                Some(value) if !field.kind.matches(value) => {
                    return Err(format!(
                        "argument '{}' must be {}, got {}",
                        field.name,
                        field.kind.label(),
                        type_name(value)
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Render the schema as a JSON Schema object for the provider's tool list.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = field.kind.json_type();
            if let Some(obj) = prop.as_object_mut() {
                obj.insert("description".into(), Value::String(field.description.clone()));
            }
            properties.insert(field.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A request from the provider to call a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Classification of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    ToolTimeout,
    ToolExecutionError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl From<&QuestError> for ToolError {
    fn from(err: &QuestError) -> Self {
        let kind = match err {
            QuestError::UnknownTool(_) => ToolErrorKind::UnknownTool,
            QuestError::InvalidArguments { .. } => ToolErrorKind::InvalidArguments,
            QuestError::ToolTimeout { .. } => ToolErrorKind::ToolTimeout,
            _ => ToolErrorKind::ToolExecutionError,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Normalised outcome of one dispatch, appended to the log whether it succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub content: String,
    /// Optional structured data returned alongside the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    pub elapsed_ms: u64,
}

impl ToolResult {
    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// What a capability hands back on a completed invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub content: String,
    pub data: Option<Value>,
    /// A capability may complete yet report failure (e.g. a non-zero exit code).
    pub success: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
            success: true,
        }
    }

    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
            success: false,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A side-effecting capability invocable by name.
///
/// Implementations are cancelled by being dropped when the dispatcher's timeout
/// elapses and must release their own resources (child processes, partial files).
#[async_trait]
pub trait ToolCapability: Send + Sync {
    async fn invoke(&self, args: &Value) -> crate::Result<ToolOutput>;
}
