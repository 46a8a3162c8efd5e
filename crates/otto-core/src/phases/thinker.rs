// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Thinker phase: one model call over the task's conversation.

use otto_model::{GenerateOptions, GenerateResult, LlmError, Message, ModelHandle, ToolSchema};

use crate::memory::MemoryIndexEntry;
use crate::{Approach, Reasoning, TaskContext};

const BASE_PROMPT: &str = "You are otto, an autonomous assistant. Work on the user's request. \
When a tool would help, call it; otherwise answer directly and concisely.";

/// Build the thinker system prompt, rendering the memory index when one is
/// available.
pub fn system_prompt(memory_index: Option<&[MemoryIndexEntry]>) -> String {
    let mut prompt = BASE_PROMPT.to_string();
    if let Some(entries) = memory_index {
        if !entries.is_empty() {
            prompt.push_str("\n\nAvailable memory:");
            for e in entries {
                prompt.push_str(&format!("\n{}: {}", e.path, e.summary));
            }
        }
    }
    prompt
}

/// Append the task's input as a user message — unless the conversation
/// already ends with exactly that text (byte-exact comparison).
pub fn ensure_input_message(ctx: &mut TaskContext) {
    let duplicate = ctx
        .messages
        .last()
        .and_then(|m| m.as_text())
        .map(|t| t == ctx.input_text)
        .unwrap_or(false);
    if !duplicate {
        ctx.messages.push(Message::user(ctx.input_text.clone()));
    }
}

/// Map a raw completion into a `Reasoning`.  The approach is `tool_use`
/// exactly when tools were offered and the model called at least one.
pub fn to_reasoning(result: GenerateResult, tools_offered: bool) -> Reasoning {
    let approach = if tools_offered && !result.tool_calls.is_empty() {
        Approach::ToolUse
    } else {
        Approach::Direct
    };
    Reasoning {
        response: result.text,
        approach,
        needs_clarification: false,
        tool_calls: result.tool_calls,
    }
}

/// Run the phase: call the model with the conversation, the offered tools,
/// and the memory-augmented system prompt.
pub async fn run(
    model: &ModelHandle,
    messages: Vec<Message>,
    tools: Vec<ToolSchema>,
    memory_index: Option<&[MemoryIndexEntry]>,
) -> Result<Reasoning, LlmError> {
    let tools_offered = !tools.is_empty();
    let opts = GenerateOptions {
        system: Some(system_prompt(memory_index)),
        messages,
        tools,
        max_tokens: None,
        temperature: None,
    };
    let result = model.generate(opts).await?;
    Ok(to_reasoning(result, tools_offered))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
