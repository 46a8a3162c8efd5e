// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Planner phase.
//!
//! Deliberately model-free: when the reasoning carries tool calls the plan
//! is one `tool_call` step per call in the given order; otherwise a single
//! `respond` step.

use crate::{ActionParams, ActionType, Plan, PlanStep, TaskContext};

pub fn run(ctx: &TaskContext) -> Plan {
    let reasoning_text = ctx
        .reasoning
        .as_ref()
        .map(|r| r.response.clone())
        .unwrap_or_default();

    let tool_calls = ctx
        .reasoning
        .as_ref()
        .map(|r| r.tool_calls.as_slice())
        .unwrap_or_default();

    if !tool_calls.is_empty() {
        let steps = tool_calls
            .iter()
            .enumerate()
            .map(|(index, tc)| PlanStep {
                index,
                description: format!("Call tool {}", tc.name),
                action_type: ActionType::ToolCall,
                action_params: ActionParams::ToolCall {
                    tool_call_id: tc.id.clone(),
                    tool_name: tc.name.clone(),
                    tool_params: tc.arguments.clone(),
                },
                completed: false,
            })
            .collect();
        return Plan {
            goal: "Execute the requested tool calls".into(),
            reasoning: reasoning_text,
            steps,
        };
    }

    Plan {
        goal: "Respond to the user".into(),
        reasoning: reasoning_text,
        steps: vec![PlanStep {
            index: 0,
            description: "Respond to the user".into(),
            action_type: ActionType::Respond,
            action_params: ActionParams::Respond,
            completed: false,
        }],
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
