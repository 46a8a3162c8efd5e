// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    AssistantToolCall, GenerateOptions, GenerateResult, LlmError, ModelClient, Role, Usage,
};

/// Deterministic mock handle for tests.  Echoes the last user message back
/// as the response.
#[derive(Default)]
pub struct MockModelClient;

#[async_trait]
impl ModelClient for MockModelClient {
    fn provider(&self) -> &str {
        "mock"
    }
    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, opts: GenerateOptions) -> Result<GenerateResult, LlmError> {
        let reply = opts
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]");
        Ok(GenerateResult {
            text: format!("MOCK: {reply}"),
            tool_calls: vec![],
            usage: Usage {
                input_tokens: 10,
                output_tokens: 10,
            },
        })
    }
}

/// A pre-scripted mock handle.  Each `generate` call pops the next result
/// from the front of the queue, so tests can specify exact sequences —
/// including tool calls — without network access.
pub struct ScriptedModelClient {
    scripts: Mutex<Vec<GenerateResult>>,
    /// The last `GenerateOptions` seen, so tests can inspect what was sent.
    pub last_options: Mutex<Option<GenerateOptions>>,
}

impl ScriptedModelClient {
    pub fn new(scripts: Vec<GenerateResult>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            last_options: Mutex::new(None),
        }
    }

    /// Handle that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![GenerateResult {
            text: reply.into(),
            tool_calls: vec![],
            usage: Usage {
                input_tokens: 5,
                output_tokens: 5,
            },
        }])
    }

    /// Handle that returns a tool call first, then a text reply on the
    /// following call.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            GenerateResult {
                text: String::new(),
                tool_calls: vec![AssistantToolCall {
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments,
                }],
                usage: Usage::default(),
            },
            GenerateResult {
                text: final_text.into(),
                tool_calls: vec![],
                usage: Usage::default(),
            },
        ])
    }

    /// Handle whose first turn is a `reply` tool call addressed to
    /// `channel_id`, followed by a closing text turn.
    pub fn reply_tool_call(
        text: impl Into<String>,
        channel_id: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        let text: String = text.into();
        let channel_id: String = channel_id.into();
        Self::tool_then_text(
            "reply-1",
            "reply",
            json!({"text": text, "channelId": channel_id}),
            final_text,
        )
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn provider(&self) -> &str {
        "mock"
    }
    fn model_id(&self) -> &str {
        "scripted-mock-model"
    }

    async fn generate(&self, opts: GenerateOptions) -> Result<GenerateResult, LlmError> {
        *self.last_options.lock().unwrap() = Some(opts);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Default fallback when all scripts are consumed
            return Ok(GenerateResult {
                text: "[no more scripts]".into(),
                tool_calls: vec![],
                usage: Usage::default(),
            });
        }
        Ok(scripts.remove(0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
