// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod client;
mod connection;
mod import;

pub use client::{McpServerConfig, McpTransportConfig, RmcpConnection};
pub use connection::{InMemoryConnection, McpConnection, McpToolDescriptor};
pub use import::{import_server, import_servers, wrapped_name, McpTool};
