// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! rmcp-backed MCP connections over stdio (child process) and HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{
        CallToolRequestParam, ClientCapabilities, Implementation, InitializeRequestParams,
        RawContent,
    },
    service::ServerSink,
    transport::{child_process::TokioChildProcess, StreamableHttpClientTransport},
    ServiceExt,
};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::{McpConnection, McpToolDescriptor};

/// How to reach an MCP server.
#[derive(Debug, Clone)]
pub enum McpTransportConfig {
    /// Spawn a local server process and speak over stdio.
    Stdio { command: String, args: Vec<String> },
    /// Connect to a streamable-HTTP server.
    Http { url: String },
}

/// Declarative description of one MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Registry prefix: imported tools are named `{name}__{tool}`.
    pub name: String,
    pub transport: McpTransportConfig,
}

fn client_info() -> InitializeRequestParams {
    InitializeRequestParams {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "otto".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
    }
}

/// A live rmcp client connection.
///
/// The background service task is kept alive for the lifetime of the
/// connection; dropping the connection ends it.
pub struct RmcpConnection {
    sink: ServerSink,
    /// Background task keeping the service alive.
    _service_handle: Arc<JoinHandle<()>>,
}

impl RmcpConnection {
    pub async fn connect(transport: &McpTransportConfig) -> anyhow::Result<Self> {
        match transport {
            McpTransportConfig::Http { url } => {
                let transport = StreamableHttpClientTransport::from_uri(url.as_str());
                let service = client_info()
                    .serve(transport)
                    .await
                    .map_err(|e| anyhow::anyhow!("connecting to {url}: {e}"))?;
                let sink = service.peer().clone();
                let handle = tokio::spawn(async move {
                    let _ = service.waiting().await;
                });
                Ok(Self {
                    sink,
                    _service_handle: Arc::new(handle),
                })
            }
            McpTransportConfig::Stdio { command, args } => {
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(args);
                let transport = TokioChildProcess::new(cmd)
                    .map_err(|e| anyhow::anyhow!("spawning {command}: {e}"))?;
                let service = client_info()
                    .serve(transport)
                    .await
                    .map_err(|e| anyhow::anyhow!("initializing {command}: {e}"))?;
                let sink = service.peer().clone();
                let handle = tokio::spawn(async move {
                    let _ = service.waiting().await;
                });
                Ok(Self {
                    sink,
                    _service_handle: Arc::new(handle),
                })
            }
        }
    }
}

#[async_trait]
impl McpConnection for RmcpConnection {
    async fn list_tools(&self) -> anyhow::Result<Vec<McpToolDescriptor>> {
        let tools = self
            .sink
            .list_tools(Default::default())
            .await
            .map_err(|e| anyhow::anyhow!("list_tools failed: {e}"))?
            .tools;
        Ok(tools
            .into_iter()
            .map(|t| McpToolDescriptor {
                name: t.name.to_string(),
                description: t
                    .description
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                input_schema: Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => anyhow::bail!("tool arguments must be an object, got: {other}"),
        };
        let result = self
            .sink
            .call_tool(CallToolRequestParam {
                meta: None,
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| anyhow::anyhow!("call_tool {name} failed: {e}"))?;

        // Concatenate text blocks; non-text content is ignored here.
        let text: String = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error.unwrap_or(false) {
            anyhow::bail!("{text}");
        }
        // Servers that return structured JSON as text get parsed through;
        // plain prose stays a string.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
