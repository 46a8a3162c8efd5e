// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod catalog;

mod anthropic;
mod client;
mod error;
mod mock;
mod openai_compat;
mod registry;
mod spec;
mod types;

pub use anthropic::AnthropicClient;
pub use client::{GenerateOptions, GenerateResult, ModelClient, ModelHandle};
pub use error::LlmError;
pub use mock::{MockModelClient, ScriptedModelClient};
pub use openai_compat::{AuthStyle, OpenAiCompatClient};
pub use registry::{CodexCredentials, ModelRegistry, OAuthCredentials};
pub use spec::{parse_model_spec, ModelRef};
pub use types::{
    AssistantToolCall, FunctionCall, Message, MessageContent, Role, ToolSchema, Usage,
};
