// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

/// A tool as described by an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object, taken verbatim from the server.
    pub input_schema: Value,
}

/// A live connection to one MCP server.
///
/// The rmcp-backed implementation lives in [`crate::client`]; tests use
/// [`InMemoryConnection`].
#[async_trait]
pub trait McpConnection: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<McpToolDescriptor>>;
    async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value>;
}

/// In-process connection double.  Serves a fixed tool list and dispatches
/// calls to registered closures.
pub struct InMemoryConnection {
    tools: Vec<McpToolDescriptor>,
    handlers: Mutex<HashMap<String, Box<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>>>,
}

impl InMemoryConnection {
    pub fn new(tools: Vec<McpToolDescriptor>) -> Self {
        Self {
            tools,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_call(
        self,
        name: impl Into<String>,
        handler: impl Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handlers
            .lock()
            .expect("handler table poisoned")
            .insert(name.into(), Box::new(handler));
        self
    }
}

#[async_trait]
impl McpConnection for InMemoryConnection {
    async fn list_tools(&self) -> anyhow::Result<Vec<McpToolDescriptor>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let handlers = self.handlers.lock().expect("handler table poisoned");
        match handlers.get(name) {
            Some(h) => h(args),
            None => anyhow::bail!("no handler for tool {name}"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn in_memory_serves_tool_list() {
        let conn = InMemoryConnection::new(vec![McpToolDescriptor {
            name: "search".into(),
            description: "find".into(),
            input_schema: json!({"type": "object"}),
        }]);
        let tools = conn.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search");
    }

    #[tokio::test]
    async fn in_memory_dispatches_calls() {
        let conn = InMemoryConnection::new(vec![])
            .on_call("echo", |args| Ok(json!({"echo": args})));
        let out = conn.call_tool("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(out["echo"]["x"], 1);
    }

    #[tokio::test]
    async fn unknown_call_errors() {
        let conn = InMemoryConnection::new(vec![]);
        assert!(conn.call_tool("ghost", json!({})).await.is_err());
    }
}
