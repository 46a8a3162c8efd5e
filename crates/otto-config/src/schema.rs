// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating settings.
///
/// Settings reject at load: an unknown key, a malformed value, or a file
/// that cannot be read all surface here rather than being silently dropped.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("settings already initialized")]
    AlreadyInitialized,
}

fn default_max_concurrent_calls() -> u32 {
    3
}
fn default_llm_timeout() -> u64 {
    120
}
fn default_max_active_tasks() -> usize {
    5
}
fn default_max_concurrent_tools() -> usize {
    3
}
fn default_max_cognitive_iterations() -> u32 {
    10
}
fn default_heartbeat_interval() -> u64 {
    60
}
fn default_task_timeout() -> u64 {
    120
}
fn default_data_dir() -> String {
    "data".into()
}
fn default_model_spec() -> ModelSpecValue {
    ModelSpecValue::Simple("openai/gpt-4o".into())
}

/// Root settings document.
///
/// Keys are camelCase in the on-disk YAML.  Unknown keys are rejected so a
/// typo in a config file fails loudly at startup instead of silently
/// falling back to a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

/// A model selector: either a bare `"{provider}/{model}"` string or an
/// object carrying per-role overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ModelSpecValue {
    Simple(String),
    Detailed {
        model: String,
        #[serde(
            rename = "contextWindow",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        context_window: Option<u32>,
        #[serde(rename = "apiType", default, skip_serializing_if = "Option::is_none")]
        api_type: Option<String>,
    },
}

impl ModelSpecValue {
    /// The `"{provider}/{model}"` string regardless of shape.
    pub fn model(&self) -> &str {
        match self {
            Self::Simple(s) => s,
            Self::Detailed { model, .. } => model,
        }
    }

    /// Role-scoped context window override, if any.
    pub fn context_window(&self) -> Option<u32> {
        match self {
            Self::Simple(_) => None,
            Self::Detailed { context_window, .. } => *context_window,
        }
    }

    /// Role-scoped API type override, if any.
    pub fn api_type(&self) -> Option<&str> {
        match self {
            Self::Simple(_) => None,
            Self::Detailed { api_type, .. } => api_type.as_deref(),
        }
    }
}

/// A named LLM provider entry under `llm.providers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(rename = "baseURL", default)]
    pub base_url: Option<String>,
    /// Wire protocol spoken by this provider (e.g. "openai", "anthropic").
    /// Providers whose name matches a known protocol may omit this.
    #[serde(rename = "type", default)]
    pub provider_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CodexSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "baseURL", default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CopilotSettings {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LlmSettings {
    /// Named provider credentials and endpoints.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
    /// Model used when a role has no explicit entry.
    #[serde(default = "default_model_spec")]
    pub default: ModelSpecValue,
    /// Role-keyed model selectors (`default`, `compact`, `reflection`, …).
    #[serde(default)]
    pub roles: HashMap<String, ModelSpecValue>,
    /// Tier-keyed selectors (`fast`, `balanced`, `powerful`).  Same value
    /// shape as `roles`; a lookup falls through roles → tiers → default.
    #[serde(default)]
    pub tiers: HashMap<String, ModelSpecValue>,
    /// Global bound on concurrently inflight model calls.
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: u32,
    /// Per-call timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub codex: CodexSettings,
    #[serde(default)]
    pub copilot: CopilotSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default: default_model_spec(),
            roles: HashMap::new(),
            tiers: HashMap::new(),
            max_concurrent_calls: default_max_concurrent_calls(),
            timeout: default_llm_timeout(),
            codex: CodexSettings::default(),
            copilot: CopilotSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemorySettings {
    #[serde(default = "MemorySettings::default_db_path")]
    pub db_path: String,
    #[serde(default = "MemorySettings::default_vector_db_path")]
    pub vector_db_path: String,
}

impl MemorySettings {
    fn default_db_path() -> String {
        "data/memory.db".into()
    }
    fn default_vector_db_path() -> String {
        "data/vectors.db".into()
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
            vector_db_path: Self::default_vector_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentSettings {
    /// Live (non-terminal) task cap; intake beyond it is rejected.
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: usize,
    /// Global bound on concurrently inflight tool calls.
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,
    /// Bound on REASON→REFLECT turns per task before forced completion.
    #[serde(default = "default_max_cognitive_iterations")]
    pub max_cognitive_iterations: u32,
    /// Heartbeat event period in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Per-tool-call timeout in seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_active_tasks: default_max_active_tasks(),
            max_concurrent_tools: default_max_concurrent_tools(),
            max_cognitive_iterations: default_max_cognitive_iterations(),
            heartbeat_interval: default_heartbeat_interval(),
            task_timeout: default_task_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Silent,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            // tracing has no fatal level; map it to error.
            Self::Error | Self::Fatal => "error",
            Self::Silent => "off",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Line,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
