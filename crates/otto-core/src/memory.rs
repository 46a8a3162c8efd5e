// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Memory index collaborator.
//!
//! Persistence lives outside the core; the loop only needs an index it can
//! render into the thinker's system prompt and a search the model can call
//! as a tool.  Failures are surfaced but never fatal.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use otto_tools::{ParamKind, ParametersSchema, Tool, ToolCall, ToolCategory, ToolContext, ToolOutput};

use crate::MemoryError;

/// One entry of the memory index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryIndexEntry {
    pub path: String,
    pub summary: String,
    pub size: u64,
}

#[async_trait]
pub trait MemoryIndex: Send + Sync {
    /// The full index, rendered into the system prompt.
    async fn index(&self) -> Result<Vec<MemoryIndexEntry>, MemoryError>;

    /// Entries matching a query, most relevant first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryIndexEntry>, MemoryError>;
}

/// Fixed in-memory index, used by tests and as a stand-in until a real
/// backend is wired.
pub struct StaticMemoryIndex {
    entries: Vec<MemoryIndexEntry>,
}

impl StaticMemoryIndex {
    pub fn new(entries: Vec<MemoryIndexEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl MemoryIndex for StaticMemoryIndex {
    async fn index(&self) -> Result<Vec<MemoryIndexEntry>, MemoryError> {
        Ok(self.entries.clone())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryIndexEntry>, MemoryError> {
        let needle = query.to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|e| {
                e.path.to_lowercase().contains(&needle)
                    || e.summary.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Lets the model search the memory index.
pub struct MemorySearchTool {
    index: Arc<dyn MemoryIndex>,
}

impl MemorySearchTool {
    pub fn new(index: Arc<dyn MemoryIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search the agent's long-term memory for entries matching a query"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Memory
    }

    fn parameters(&self) -> ParametersSchema {
        ParametersSchema::new()
            .required("query", ParamKind::String, "text to search for")
            .optional("limit", ParamKind::Integer, "maximum entries to return")
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
        let query = call.args["query"].as_str().unwrap_or_default();
        let limit = call.args["limit"].as_u64().unwrap_or(5) as usize;
        match self.index.search(query, limit).await {
            Ok(entries) => ToolOutput::ok(json!({
                "entries": entries
                    .iter()
                    .map(|e| json!({"path": e.path, "summary": e.summary, "size": e.size}))
                    .collect::<Vec<_>>(),
            })),
            // Memory failures are non-fatal: the step fails, the task
            // reflects and continues.
            Err(e) => ToolOutput::failure(e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> StaticMemoryIndex {
        StaticMemoryIndex::new(vec![
            MemoryIndexEntry {
                path: "facts/rust.md".into(),
                summary: "Rust borrow checker notes".into(),
                size: 120,
            },
            MemoryIndexEntry {
                path: "episodes/deploy.md".into(),
                summary: "last deployment incident".into(),
                size: 340,
            },
        ])
    }

    #[tokio::test]
    async fn search_matches_path_and_summary() {
        let idx = index();
        assert_eq!(idx.search("rust", 10).await.unwrap().len(), 1);
        assert_eq!(idx.search("deployment", 10).await.unwrap().len(), 1);
        assert_eq!(idx.search("nothing", 10).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let idx = index();
        assert_eq!(idx.search("md", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tool_returns_entries_json() {
        let tool = MemorySearchTool::new(Arc::new(index()));
        let call = ToolCall {
            id: "c1".into(),
            name: "memory_search".into(),
            args: json!({"query": "rust"}),
        };
        let out = tool.execute(&call, &ToolContext::default()).await;
        assert!(out.success);
        assert_eq!(out.result.unwrap()["entries"][0]["path"], "facts/rust.md");
    }

    #[tokio::test]
    async fn tool_failure_is_nonfatal_output() {
        struct Broken;
        #[async_trait]
        impl MemoryIndex for Broken {
            async fn index(&self) -> Result<Vec<MemoryIndexEntry>, MemoryError> {
                Err(MemoryError("db locked".into()))
            }
            async fn search(
                &self,
                _q: &str,
                _l: usize,
            ) -> Result<Vec<MemoryIndexEntry>, MemoryError> {
                Err(MemoryError("db locked".into()))
            }
        }
        let tool = MemorySearchTool::new(Arc::new(Broken));
        let call = ToolCall {
            id: "c1".into(),
            name: "memory_search".into(),
            args: json!({"query": "x"}),
        };
        let out = tool.execute(&call, &ToolContext::default()).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("db locked"));
    }
}
