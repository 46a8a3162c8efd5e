// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Reflector phase: loop or terminate.
//!
//! The decision is deterministic.  The task is satisfied once the plan is
//! fully executed and a `respond` step produced non-empty text; otherwise —
//! tool results still need synthesis, or the user must clarify — the loop
//! re-enters reasoning.  The iteration cap is enforced by the loop driver,
//! not here.

use crate::{Reflection, TaskContext};

pub fn run(ctx: &TaskContext) -> Reflection {
    let plan_complete = ctx.plan.as_ref().map(|p| p.is_complete()).unwrap_or(false);
    let has_reply = ctx.last_response_text().is_some();
    let satisfied = plan_complete && has_reply;

    let needs_clarification = ctx
        .reasoning
        .as_ref()
        .map(|r| r.needs_clarification)
        .unwrap_or(false);

    let should_continue = !satisfied || needs_clarification;
    let notes = if satisfied {
        "goal satisfied; terminating".to_string()
    } else if !plan_complete {
        "plan incomplete; continuing".to_string()
    } else {
        "no user-facing response yet; continuing".to_string()
    };

    Reflection {
        iteration: ctx.iteration,
        satisfied,
        should_continue,
        notes,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::{phases::planner, ActionType, Approach, Reasoning, StepResult};
    use otto_bus::ChannelCoordinate;
    use otto_model::AssistantToolCall;

    fn base_ctx() -> TaskContext {
        TaskContext::new(ChannelCoordinate::new("cli", "main"), "input")
    }

    #[test]
    fn satisfied_after_completed_respond_step() {
        let mut ctx = base_ctx();
        ctx.iteration = 1;
        ctx.reasoning = Some(Reasoning {
            response: "done".into(),
            approach: Approach::Direct,
            needs_clarification: false,
            tool_calls: vec![],
        });
        let mut plan = planner::run(&ctx);
        plan.steps[0].completed = true;
        ctx.plan = Some(plan);
        ctx.actions_done.push(StepResult::completed(
            0,
            ActionType::Respond,
            json!({}),
            Value::String("done".into()),
        ));

        let r = run(&ctx);
        assert!(r.satisfied);
        assert!(!r.should_continue);
        assert_eq!(r.iteration, 1);
    }

    #[test]
    fn tool_only_iteration_continues() {
        let mut ctx = base_ctx();
        ctx.iteration = 1;
        ctx.reasoning = Some(Reasoning {
            response: String::new(),
            approach: Approach::ToolUse,
            needs_clarification: false,
            tool_calls: vec![AssistantToolCall {
                id: "c1".into(),
                name: "search".into(),
                arguments: json!({}),
            }],
        });
        let mut plan = planner::run(&ctx);
        plan.steps[0].completed = true;
        ctx.plan = Some(plan);
        // The tool result is recorded, but there is no respond step yet.
        let mut tool_result = StepResult::pending(0, ActionType::ToolCall, json!({}));
        tool_result.finish(true, Some(json!("found")), None, 5);
        ctx.actions_done.push(tool_result);

        let r = run(&ctx);
        assert!(!r.satisfied);
        assert!(r.should_continue);
    }

    #[test]
    fn incomplete_plan_continues() {
        let mut ctx = base_ctx();
        ctx.reasoning = Some(Reasoning {
            response: "partial".into(),
            approach: Approach::Direct,
            needs_clarification: false,
            tool_calls: vec![],
        });
        ctx.plan = Some(planner::run(&ctx)); // step not completed
        let r = run(&ctx);
        assert!(r.should_continue);
        assert!(r.notes.contains("plan incomplete"));
    }

    #[test]
    fn empty_response_is_not_a_reply() {
        let mut ctx = base_ctx();
        ctx.reasoning = Some(Reasoning {
            response: String::new(),
            approach: Approach::Direct,
            needs_clarification: false,
            tool_calls: vec![],
        });
        let mut plan = planner::run(&ctx);
        plan.steps[0].completed = true;
        ctx.plan = Some(plan);
        ctx.actions_done.push(StepResult::completed(
            0,
            ActionType::Respond,
            json!({}),
            Value::String(String::new()),
        ));
        let r = run(&ctx);
        assert!(!r.satisfied);
    }
}
