// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Actor phase: drive one plan step.
//!
//! `respond` and stub steps complete synchronously.  A `tool_call` step
//! pushes the assistant tool-call message, records a *pending* step result,
//! and hands the call to the executor via the returned request — the
//! completion arrives asynchronously, linked by `tool_call_id`.

use serde_json::{json, Value};

use otto_model::Message;

use crate::{ActionParams, ActionType, StepResult, TaskContext};

/// What the actor decided for one step.
#[derive(Debug)]
pub enum ActorOutcome {
    /// The step finished synchronously; emit `STEP_COMPLETED`.
    Completed(StepResult),
    /// The step is a tool call; emit `TOOL_CALL_REQUESTED` and wait.
    ToolPending {
        result: StepResult,
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
    /// The plan has no such step — a fatal bookkeeping error.
    MissingStep,
}

pub fn run(ctx: &mut TaskContext, step_index: usize) -> ActorOutcome {
    let Some(step) = ctx
        .plan
        .as_ref()
        .and_then(|p| p.steps.get(step_index))
        .cloned()
    else {
        return ActorOutcome::MissingStep;
    };

    match (&step.action_type, &step.action_params) {
        (ActionType::Respond, _) => {
            let text = ctx
                .reasoning
                .as_ref()
                .map(|r| r.response.clone())
                .unwrap_or_default();
            if !text.is_empty() {
                ctx.messages.push(Message::assistant(text.clone()));
            }
            ActorOutcome::Completed(StepResult::completed(
                step_index,
                ActionType::Respond,
                json!({}),
                Value::String(text),
            ))
        }
        (
            ActionType::ToolCall,
            ActionParams::ToolCall {
                tool_call_id,
                tool_name,
                tool_params,
            },
        ) => {
            ctx.messages.push(Message::tool_call(
                tool_call_id.clone(),
                tool_name.clone(),
                tool_params.clone(),
            ));
            let result = StepResult::pending(
                step_index,
                ActionType::ToolCall,
                json!({
                    "toolCallId": tool_call_id,
                    "toolName": tool_name,
                    "toolParams": tool_params,
                }),
            );
            ActorOutcome::ToolPending {
                result,
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                arguments: tool_params.clone(),
            }
        }
        // Anything else is acknowledged with a stub completion.
        (other, _) => ActorOutcome::Completed(StepResult::completed(
            step_index,
            other.clone(),
            json!({}),
            Value::String(format!(
                "[Stub] Completed step {}: {}",
                step.index, step.description
            )),
        )),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
