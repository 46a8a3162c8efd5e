// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use otto_bus::{ChannelCoordinate, TaskId};

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier from the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// Ambient context handed to a tool for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub task_id: Option<TaskId>,
    /// Originating channel of the driving task, when known.
    pub channel: Option<ChannelCoordinate>,
}

/// The outcome of executing a tool.
///
/// A tool that fails non-fatally returns `failure` — the executor passes it
/// through without re-raising.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn ok_text(text: impl Into<String>) -> Self {
        Self::ok(Value::String(text.into()))
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(msg.into()),
        }
    }
}

/// Coarse grouping used by registry stats and discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    General,
    Memory,
    Channel,
    Mcp,
    Custom(String),
}

impl ToolCategory {
    pub fn label(&self) -> &str {
        match self {
            Self::General => "general",
            Self::Memory => "memory",
            Self::Channel => "channel",
            Self::Mcp => "mcp",
            Self::Custom(s) => s,
        }
    }
}

/// One parameter's declared JSON type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn matches(self, v: &Value) -> bool {
        match self {
            Self::String => v.is_string(),
            Self::Integer => v.is_i64() || v.is_u64(),
            Self::Number => v.is_number(),
            Self::Boolean => v.is_boolean(),
            Self::Object => v.is_object(),
            Self::Array => v.is_array(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// Structured parameter schema for a tool.
///
/// Validation happens against this shape; the JSON Schema sent to the model
/// is derived from it unless the tool carries a pre-baked schema.
#[derive(Debug, Clone, Default)]
pub struct ParametersSchema {
    params: Vec<ParamSpec>,
}

impl ParametersSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        });
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Derive the JSON Schema wire representation.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({"type": p.kind.json_name(), "description": p.description}),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }

    /// Check `args` against the declared shape.  Unknown keys are allowed;
    /// missing required keys and type mismatches are not.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let obj = match args {
            Value::Object(map) => map,
            Value::Null if self.params.iter().all(|p| !p.required) => return Ok(()),
            _ => return Err("arguments must be an object".into()),
        };
        for p in &self.params {
            match obj.get(&p.name) {
                Some(v) => {
                    if !p.kind.matches(v) {
                        return Err(format!(
                            "parameter \"{}\" must be of type {}",
                            p.name,
                            p.kind.json_name()
                        ));
                    }
                }
                None if p.required => {
                    return Err(format!("missing required parameter \"{}\"", p.name));
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// Trait that every builtin and imported tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> ToolCategory {
        ToolCategory::General
    }
    /// Structured parameter schema, used for validation and — absent a
    /// pre-baked schema — for the wire representation.
    fn parameters(&self) -> ParametersSchema;
    /// Pre-baked JSON Schema.  When present it is sent to the model verbatim
    /// and structural validation is skipped (the owning server validates).
    fn parameters_json_schema(&self) -> Option<Value> {
        None
    }
    /// Execute the tool.  Failures are wrapped in [`ToolOutput::failure`].
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParametersSchema {
        ParametersSchema::new()
            .required("query", ParamKind::String, "what to search for")
            .optional("limit", ParamKind::Integer, "max results")
    }

    #[test]
    fn json_schema_has_properties_and_required() {
        let js = schema().to_json_schema();
        assert_eq!(js["type"], "object");
        assert_eq!(js["properties"]["query"]["type"], "string");
        assert_eq!(js["properties"]["limit"]["type"], "integer");
        assert_eq!(js["required"], json!(["query"]));
    }

    #[test]
    fn validate_accepts_well_formed_args() {
        assert!(schema().validate(&json!({"query": "rust", "limit": 3})).is_ok());
    }

    #[test]
    fn validate_allows_missing_optional() {
        assert!(schema().validate(&json!({"query": "rust"})).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let err = schema().validate(&json!({"limit": 3})).unwrap_err();
        assert!(err.contains("missing required parameter \"query\""));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let err = schema().validate(&json!({"query": 42})).unwrap_err();
        assert!(err.contains("\"query\""));
        assert!(err.contains("string"));
    }

    #[test]
    fn validate_rejects_non_object() {
        assert!(schema().validate(&json!("just a string")).is_err());
    }

    #[test]
    fn validate_allows_unknown_keys() {
        assert!(schema()
            .validate(&json!({"query": "x", "extra": true}))
            .is_ok());
    }

    #[test]
    fn null_args_pass_when_nothing_required() {
        let s = ParametersSchema::new().optional("a", ParamKind::String, "");
        assert!(s.validate(&Value::Null).is_ok());
    }

    #[test]
    fn output_constructors() {
        let ok = ToolOutput::ok_text("done");
        assert!(ok.success);
        assert_eq!(ok.result, Some(json!("done")));
        let bad = ToolOutput::failure("nope");
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("nope"));
    }

    #[test]
    fn category_labels() {
        assert_eq!(ToolCategory::Mcp.label(), "mcp");
        assert_eq!(ToolCategory::Custom("x".into()).label(), "x");
    }
}
