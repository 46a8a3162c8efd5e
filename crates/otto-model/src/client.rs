// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;

use crate::{AssistantToolCall, LlmError, Message, ToolSchema, Usage};

/// One completion request.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// System prompt, sent ahead of `messages`.
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// Tools offered to the model; empty disables tool calling.
    pub tools: Vec<ToolSchema>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// One completion response.
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub text: String,
    pub tool_calls: Vec<AssistantToolCall>,
    pub usage: Usage,
}

/// A resolved model handle.
///
/// Implementations wrap one provider endpoint + model id pair.  Handles are
/// cached by the registry and shared: two roles resolving to the same
/// provider/model/api-type triple receive the same `Arc`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider segment this handle was resolved from (e.g. "openai").
    fn provider(&self) -> &str;

    /// Model identifier forwarded to the API.
    fn model_id(&self) -> &str;

    async fn generate(&self, opts: GenerateOptions) -> Result<GenerateResult, LlmError>;
}

pub type ModelHandle = Arc<dyn ModelClient>;
