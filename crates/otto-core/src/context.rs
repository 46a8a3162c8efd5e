// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde_json::Value;

use otto_bus::{ChannelCoordinate, TaskId};
use otto_model::{AssistantToolCall, Message};

use crate::memory::MemoryIndexEntry;

/// How the thinker decided to proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approach {
    Direct,
    ToolUse,
    Other(String),
}

impl Approach {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Direct => "direct",
            Self::ToolUse => "tool_use",
            Self::Other(s) => s,
        }
    }
}

/// Result of one thinker pass.
#[derive(Debug, Clone)]
pub struct Reasoning {
    pub response: String,
    pub approach: Approach,
    pub needs_clarification: bool,
    pub tool_calls: Vec<AssistantToolCall>,
}

/// What kind of action a plan step performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
    Respond,
    ToolCall,
    Generate,
    Other(String),
}

impl ActionType {
    pub fn label(&self) -> &str {
        match self {
            Self::Respond => "respond",
            Self::ToolCall => "tool_call",
            Self::Generate => "generate",
            Self::Other(s) => s,
        }
    }
}

/// Typed parameters of a plan step.
#[derive(Debug, Clone)]
pub enum ActionParams {
    Respond,
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        tool_params: Value,
    },
    Other(Value),
}

/// One step of a plan.  `index` matches the step's position in
/// `Plan::steps`; `completed` only ever moves false → true.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub index: usize,
    pub description: String,
    pub action_type: ActionType,
    pub action_params: ActionParams,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub goal: String,
    pub reasoning: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }
}

/// Outcome of driving one plan step.
///
/// A `tool_call` result starts pending — no `result`, no `completed_at` —
/// and is finished later by the tool completion event.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step_index: usize,
    pub action_type: ActionType,
    pub action_input: Value,
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl StepResult {
    /// A result that completed synchronously.
    pub fn completed(step_index: usize, action_type: ActionType, input: Value, result: Value) -> Self {
        let now = Utc::now();
        Self {
            step_index,
            action_type,
            action_input: input,
            success: true,
            result: Some(result),
            error: None,
            started_at: now,
            completed_at: Some(now),
            duration_ms: Some(0),
        }
    }

    /// A result awaiting asynchronous completion.
    pub fn pending(step_index: usize, action_type: ActionType, input: Value) -> Self {
        Self {
            step_index,
            action_type,
            action_input: input,
            success: true,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.completed_at.is_none()
    }

    /// Finish a pending result.
    pub fn finish(
        &mut self,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
        duration_ms: u64,
    ) {
        self.success = success;
        self.result = result;
        self.error = error;
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
    }
}

/// Outcome of one reflector pass.
#[derive(Debug, Clone)]
pub struct Reflection {
    pub iteration: u32,
    pub satisfied: bool,
    pub should_continue: bool,
    pub notes: String,
}

/// Terminal result of a task, carried on `TASK_COMPLETED`.
#[derive(Debug, Clone)]
pub struct FinalResult {
    pub task_id: TaskId,
    pub text: String,
    pub iterations: u32,
    /// Set when completion was forced, e.g. by the iteration cap.
    pub warning: Option<String>,
}

/// Accumulator for one task's cognitive state.  Single-writer: only the
/// handler chain for this task's events mutates it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub input_text: String,
    pub channel: ChannelCoordinate,
    pub messages: Vec<Message>,
    pub reasoning: Option<Reasoning>,
    pub plan: Option<Plan>,
    pub actions_done: Vec<StepResult>,
    pub reflections: Vec<Reflection>,
    /// Monotonic count of REASON→REFLECT turns; bumped on every entry into
    /// REASONING.
    pub iteration: u32,
    pub final_result: Option<FinalResult>,
    pub memory_index: Option<Vec<MemoryIndexEntry>>,
}

impl TaskContext {
    pub fn new(channel: ChannelCoordinate, input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
            channel,
            messages: Vec::new(),
            reasoning: None,
            plan: None,
            actions_done: Vec::new(),
            reflections: Vec::new(),
            iteration: 0,
            final_result: None,
            memory_index: None,
        }
    }

    /// Last successful `respond` result text, when any.
    pub fn last_response_text(&self) -> Option<&str> {
        self.actions_done
            .iter()
            .rev()
            .filter(|r| r.action_type == ActionType::Respond && r.success)
            .find_map(|r| r.result.as_ref().and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
    }
}

/// Coerce an optional payload value into message text.
///
/// Absent → `""`, JSON null → `"null"`, strings verbatim, everything else
/// compact-serialized.
pub fn stringify_content(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Null) => "null".into(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pending_step_result_has_no_completion() {
        let r = StepResult::pending(0, ActionType::ToolCall, json!({}));
        assert!(r.is_pending());
        assert!(r.success, "pending results are provisionally successful");
        assert!(r.result.is_none());
        assert!(r.duration_ms.is_none());
    }

    #[test]
    fn finish_sets_completion_fields() {
        let mut r = StepResult::pending(1, ActionType::ToolCall, json!({}));
        r.finish(true, Some(json!("out")), None, 42);
        assert!(!r.is_pending());
        assert_eq!(r.result, Some(json!("out")));
        assert_eq!(r.duration_ms, Some(42));
    }

    #[test]
    fn completed_step_result_is_not_pending() {
        let r = StepResult::completed(0, ActionType::Respond, json!({}), json!("hi"));
        assert!(!r.is_pending());
    }

    #[test]
    fn last_response_text_skips_failures_and_tools() {
        let mut ctx = TaskContext::new(ChannelCoordinate::new("cli", "main"), "hi");
        ctx.actions_done
            .push(StepResult::completed(0, ActionType::Respond, json!({}), json!("first")));
        let mut failed = StepResult::pending(1, ActionType::Respond, json!({}));
        failed.finish(false, Some(json!("bad")), Some("err".into()), 1);
        ctx.actions_done.push(failed);
        ctx.actions_done
            .push(StepResult::completed(2, ActionType::ToolCall, json!({}), json!("tool out")));
        assert_eq!(ctx.last_response_text(), Some("first"));
    }

    #[test]
    fn stringify_content_coercions() {
        assert_eq!(stringify_content(None), "");
        assert_eq!(stringify_content(Some(&Value::Null)), "null");
        assert_eq!(stringify_content(Some(&json!("text"))), "text");
        assert_eq!(stringify_content(Some(&json!({"a": 1}))), r#"{"a":1}"#);
    }

    #[test]
    fn plan_completeness() {
        let plan = Plan {
            goal: "g".into(),
            reasoning: String::new(),
            steps: vec![PlanStep {
                index: 0,
                description: "d".into(),
                action_type: ActionType::Respond,
                action_params: ActionParams::Respond,
                completed: false,
            }],
        };
        assert!(!plan.is_complete());
    }
}
