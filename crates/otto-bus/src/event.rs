// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier of a task.  Allocated by the task registry; carried on
/// every event that belongs to a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity tuple of a message endpoint.  Carried on every inbound and
/// outbound envelope and stored on the task so replies can be routed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCoordinate {
    /// Stable adapter type, e.g. "cli", "telegram", "project".
    #[serde(rename = "type")]
    pub channel_type: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl ChannelCoordinate {
    pub fn new(channel_type: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            channel_id: channel_id.into(),
            user_id: None,
            reply_to: None,
        }
    }
}

/// A message entering the system from a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inbound {
    pub text: String,
    pub channel: ChannelCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Every event type known to the runtime.
///
/// The numeric value doubles as the default dispatch priority (lower =
/// more urgent).  Values are segmented by hundreds:
///
/// | range   | segment        |
/// |---------|----------------|
/// | 0–99    | system         |
/// | 100–199 | external input |
/// | 200–299 | task lifecycle |
/// | 300–399 | cognitive      |
/// | 400–499 | tool           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum EventType {
    SystemStarted = 0,
    Heartbeat = 10,
    SystemStopping = 20,
    MessageReceived = 100,
    TaskCreated = 200,
    TaskCompleted = 210,
    TaskFailed = 220,
    TaskCancelled = 230,
    ReasonDone = 300,
    PlanDone = 310,
    StepRequested = 320,
    StepCompleted = 330,
    ReflectDone = 340,
    ToolCallRequested = 400,
    ToolCallCompleted = 410,
    ToolCallFailed = 420,
}

impl EventType {
    /// The default priority encoded in the type's numeric value.
    pub fn default_priority(self) -> u16 {
        self as u16
    }

    /// True for event types that end a task's life.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::TaskCompleted | Self::TaskFailed | Self::TaskCancelled
        )
    }

    /// True for event types in the tool segment (400–499).
    pub fn is_tool(self) -> bool {
        (400..500).contains(&self.default_priority())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SystemStarted => "SYSTEM_STARTED",
            Self::Heartbeat => "HEARTBEAT",
            Self::SystemStopping => "SYSTEM_STOPPING",
            Self::MessageReceived => "MESSAGE_RECEIVED",
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskFailed => "TASK_FAILED",
            Self::TaskCancelled => "TASK_CANCELLED",
            Self::ReasonDone => "REASON_DONE",
            Self::PlanDone => "PLAN_DONE",
            Self::StepRequested => "STEP_REQUESTED",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::ReflectDone => "REFLECT_DONE",
            Self::ToolCallRequested => "TOOL_CALL_REQUESTED",
            Self::ToolCallCompleted => "TOOL_CALL_COMPLETED",
            Self::ToolCallFailed => "TOOL_CALL_FAILED",
        };
        write!(f, "{name}")
    }
}

/// Typed event payload.
///
/// Each variant corresponds to one family of event types; `Other` is the
/// open-shape escape hatch for payloads the core does not interpret.
#[derive(Debug, Clone)]
pub enum EventPayload {
    None,
    /// `MESSAGE_RECEIVED`
    Inbound(Inbound),
    /// `TASK_CREATED`
    TaskCreated {
        input_text: String,
        channel: ChannelCoordinate,
    },
    /// `STEP_REQUESTED` / `STEP_COMPLETED`
    Step { step_index: usize },
    /// `TOOL_CALL_REQUESTED`
    ToolCallRequested {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        step_index: usize,
        /// Originating channel of the task, for tools that route replies.
        channel: Option<ChannelCoordinate>,
    },
    /// `TOOL_CALL_COMPLETED` / `TOOL_CALL_FAILED`
    ToolCallResult {
        tool_call_id: String,
        step_index: usize,
        success: bool,
        result: Option<Value>,
        error: Option<String>,
        duration_ms: u64,
    },
    /// `TASK_COMPLETED`
    FinalResult {
        task_id: TaskId,
        text: String,
        iterations: u32,
        /// Set when completion was forced (e.g. iteration cap reached).
        warning: Option<String>,
    },
    /// `TASK_FAILED` / `TASK_CANCELLED` / `TOOL_CALL_FAILED` conversions
    Error { kind: String, message: String },
    Other(Value),
}

/// Unique, sortable event identifier.  Allocation order equals emission
/// order within one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_event_id() -> EventId {
    EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Immutable record of one state transition.
///
/// All fields are fixed at construction; the bus hands out `Arc<Event>` so
/// no subscriber can observe a mutation.
#[derive(Debug, Clone)]
pub struct Event {
    id: EventId,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    task_id: Option<TaskId>,
    source: String,
    parent_event_id: Option<EventId>,
    payload: EventPayload,
    priority: Option<u16>,
}

impl Event {
    /// Construct an event originating from the system itself.
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: next_event_id(),
            event_type,
            timestamp: Utc::now(),
            task_id: None,
            source: "system".into(),
            parent_event_id: None,
            payload: EventPayload::None,
            priority: None,
        }
    }

    /// Construct a child event: copies `task_id` and `source` from the
    /// parent and records the causal link.
    pub fn derive(parent: &Event, event_type: EventType) -> Self {
        Self {
            id: next_event_id(),
            event_type,
            timestamp: Utc::now(),
            task_id: parent.task_id.clone(),
            source: parent.source.clone(),
            parent_event_id: Some(parent.id),
            payload: EventPayload::None,
            priority: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Override the type's default priority.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parent_event_id(&self) -> Option<EventId> {
        self.parent_event_id
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// `priority ?? type` — the value the scheduler orders by.
    pub fn effective_priority(&self) -> u16 {
        self.priority.unwrap_or(self.event_type.default_priority())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_unique_and_sortable() {
        let a = Event::new(EventType::Heartbeat);
        let b = Event::new(EventType::Heartbeat);
        assert!(a.id() < b.id());
    }

    #[test]
    fn type_value_is_default_priority() {
        assert_eq!(EventType::SystemStarted.default_priority(), 0);
        assert_eq!(EventType::MessageReceived.default_priority(), 100);
        assert_eq!(EventType::TaskCreated.default_priority(), 200);
        assert_eq!(EventType::ReasonDone.default_priority(), 300);
        assert_eq!(EventType::ToolCallRequested.default_priority(), 400);
    }

    #[test]
    fn effective_priority_defaults_to_type() {
        let e = Event::new(EventType::MessageReceived);
        assert_eq!(e.effective_priority(), 100);
    }

    #[test]
    fn explicit_priority_overrides_type() {
        let e = Event::new(EventType::MessageReceived).with_priority(5);
        assert_eq!(e.effective_priority(), 5);
    }

    #[test]
    fn derive_copies_task_and_source_and_links_parent() {
        let parent = Event::new(EventType::MessageReceived)
            .with_source("cli")
            .with_task(TaskId::from("t-1"));
        let child = Event::derive(&parent, EventType::TaskCreated);
        assert_eq!(child.source(), "cli");
        assert_eq!(child.task_id(), Some(&TaskId::from("t-1")));
        assert_eq!(child.parent_event_id(), Some(parent.id()));
        assert_ne!(child.id(), parent.id());
    }

    #[test]
    fn terminal_types() {
        assert!(EventType::TaskCompleted.is_terminal());
        assert!(EventType::TaskFailed.is_terminal());
        assert!(EventType::TaskCancelled.is_terminal());
        assert!(!EventType::TaskCreated.is_terminal());
    }

    #[test]
    fn tool_segment_detection() {
        assert!(EventType::ToolCallRequested.is_tool());
        assert!(EventType::ToolCallFailed.is_tool());
        assert!(!EventType::StepCompleted.is_tool());
    }

    #[test]
    fn display_names_are_screaming_case() {
        assert_eq!(EventType::TaskCreated.to_string(), "TASK_CREATED");
        assert_eq!(EventType::ReasonDone.to_string(), "REASON_DONE");
    }
}
