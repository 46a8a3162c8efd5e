// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::{Tool, ToolError};

/// A tool's wire representation, as offered to the model.
#[derive(Debug, Clone)]
pub struct LlmToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Running execution statistics for one tool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallStats {
    pub count: u64,
    pub failures: u64,
    pub avg_duration_ms: f64,
}

/// Aggregate registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub by_category: HashMap<String, usize>,
    pub call_stats: HashMap<String, CallStats>,
}

/// Central catalog of all available tools, keyed by unique name.
///
/// Registration after startup is allowed (MCP servers load late), so the
/// registry is interior-mutable and every method takes `&self`.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    stats: Mutex<HashMap<String, CallStats>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Register a tool.  Names are unique; a second registration under the
    /// same name is an error, not an overwrite.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().expect("tool table poisoned");
        if tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().expect("tool table poisoned").get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.read().expect("tool table poisoned").contains_key(name)
    }

    /// All registered names, sorted for deterministic output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .read()
            .expect("tool table poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().expect("tool table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wire schemas for every tool, sorted by name.  A pre-baked JSON Schema
    /// is used verbatim; otherwise the structured schema is converted.
    pub fn to_llm_tools(&self) -> Vec<LlmToolSchema> {
        let tools = self.tools.read().expect("tool table poisoned");
        let mut schemas: Vec<LlmToolSchema> = tools
            .values()
            .map(|t| LlmToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t
                    .parameters_json_schema()
                    .unwrap_or_else(|| t.parameters().to_json_schema()),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Fold one execution into the per-tool running statistics.
    /// The mean duration is updated incrementally.
    pub fn update_call_stats(&self, name: &str, duration_ms: u64, success: bool) {
        let mut stats = self.stats.lock().expect("tool stats poisoned");
        let entry = stats.entry(name.to_string()).or_default();
        entry.count += 1;
        if !success {
            entry.failures += 1;
        }
        entry.avg_duration_ms += (duration_ms as f64 - entry.avg_duration_ms) / entry.count as f64;
    }

    pub fn stats(&self) -> RegistryStats {
        let tools = self.tools.read().expect("tool table poisoned");
        let mut by_category: HashMap<String, usize> = HashMap::new();
        for t in tools.values() {
            *by_category.entry(t.category().label().to_string()).or_default() += 1;
        }
        RegistryStats {
            total: tools.len(),
            by_category,
            call_stats: self.stats.lock().expect("tool stats poisoned").clone(),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
