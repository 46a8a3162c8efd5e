// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Importing MCP server tools into the tool registry.
//!
//! Each imported tool is registered as `{server}__{tool}` with category
//! `Mcp` and the server's JSON Schema carried verbatim.  The prefix keeps
//! tools from different servers — and from the builtin set — from
//! colliding.  A server that fails to load is logged and skipped so one
//! broken server never aborts startup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use otto_tools::{
    ParametersSchema, Tool, ToolCall, ToolCategory, ToolContext, ToolOutput, ToolRegistry,
};

use crate::{McpConnection, McpServerConfig, RmcpConnection};

/// Registry name of a wrapped server tool.
pub fn wrapped_name(server: &str, tool: &str) -> String {
    format!("{server}__{tool}")
}

/// One imported MCP tool.  Forwards execution to its server connection.
pub struct McpTool {
    name: String,
    description: String,
    schema: Value,
    remote_name: String,
    connection: Arc<dyn McpConnection>,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Mcp
    }

    fn parameters(&self) -> ParametersSchema {
        // The structural schema is unused: the server's JSON Schema below
        // is authoritative and the server validates its own inputs.
        ParametersSchema::new()
    }

    fn parameters_json_schema(&self) -> Option<Value> {
        Some(self.schema.clone())
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
        match self
            .connection
            .call_tool(&self.remote_name, call.args.clone())
            .await
        {
            Ok(result) => ToolOutput::ok(result),
            Err(e) => ToolOutput::failure(e.to_string()),
        }
    }
}

/// Import every tool from one connected server.  Returns the number of
/// tools registered.  A name collision within the registry is logged and
/// the tool skipped.
pub async fn import_server(
    registry: &ToolRegistry,
    server_name: &str,
    connection: Arc<dyn McpConnection>,
) -> anyhow::Result<usize> {
    let descriptors = connection.list_tools().await?;
    let mut imported = 0;
    for d in descriptors {
        let tool = McpTool {
            name: wrapped_name(server_name, &d.name),
            description: d.description,
            schema: d.input_schema,
            remote_name: d.name,
            connection: Arc::clone(&connection),
        };
        match registry.register(Arc::new(tool)) {
            Ok(()) => imported += 1,
            Err(e) => warn!(server = server_name, error = %e, "skipping MCP tool"),
        }
    }
    info!(server = server_name, imported, "imported MCP tools");
    Ok(imported)
}

/// Connect and import every configured server.
///
/// Graceful degradation: a server that fails to connect or enumerate is
/// logged per-server and the remaining servers still load.  Returns the
/// total number of imported tools.
pub async fn import_servers(registry: &ToolRegistry, servers: &[McpServerConfig]) -> usize {
    let mut total = 0;
    for server in servers {
        let connection = match RmcpConnection::connect(&server.transport).await {
            Ok(c) => Arc::new(c) as Arc<dyn McpConnection>,
            Err(e) => {
                warn!(server = %server.name, error = %e, "MCP server failed to load");
                continue;
            }
        };
        match import_server(registry, &server.name, connection).await {
            Ok(n) => total += n,
            Err(e) => warn!(server = %server.name, error = %e, "MCP server failed to enumerate"),
        }
    }
    total
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
