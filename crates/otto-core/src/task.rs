// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};

use otto_bus::{ChannelCoordinate, TaskId};

use crate::{TaskContext, TaskError};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Reasoning,
    Planning,
    Acting,
    Reflecting,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Reasoning => "REASONING",
            Self::Planning => "PLANNING",
            Self::Acting => "ACTING",
            Self::Reflecting => "REFLECTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

/// The transition table.  Everything not listed here is illegal.
fn is_legal(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;
    matches!(
        (from, to),
        (Pending, Reasoning)
            | (Pending, Cancelled)
            | (Pending, Failed)
            | (Reasoning, Planning)
            | (Reasoning, Failed)
            | (Reasoning, Cancelled)
            | (Planning, Acting)
            | (Planning, Failed)
            | (Planning, Cancelled)
            | (Acting, Acting)
            | (Acting, Reflecting)
            | (Acting, Failed)
            | (Acting, Cancelled)
            | (Reflecting, Reasoning)
            | (Reflecting, Completed)
            | (Reflecting, Failed)
            | (Reflecting, Cancelled)
    )
}

/// State machine for one task.  Owns the task's context; terminal states
/// freeze it.
#[derive(Debug)]
pub struct TaskFsm {
    id: TaskId,
    state: TaskState,
    context: TaskContext,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// `(kind, message)` recorded when the task failed.
    error: Option<(String, String)>,
}

impl TaskFsm {
    pub fn new(id: TaskId, channel: ChannelCoordinate, input_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: TaskState::Pending,
            context: TaskContext::new(channel, input_text),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn error(&self) -> Option<&(String, String)> {
        self.error.as_ref()
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    /// Mutable context access.  `None` once the task is terminal — terminal
    /// contexts are write-frozen.
    pub fn context_mut(&mut self) -> Option<&mut TaskContext> {
        if self.state.is_terminal() {
            None
        } else {
            Some(&mut self.context)
        }
    }

    /// Apply a transition.
    ///
    /// An out-of-table transition is a fatal per-task error: the task is
    /// put into FAILED (unless already terminal), the violation recorded,
    /// and the error returned so the caller can surface `TASK_FAILED`.
    pub fn transition(&mut self, to: TaskState) -> Result<(), TaskError> {
        let from = self.state;
        if is_legal(from, to) {
            self.state = to;
            self.updated_at = Utc::now();
            return Ok(());
        }
        if !from.is_terminal() {
            self.state = TaskState::Failed;
            self.error = Some((
                "InvalidStateTransition".into(),
                format!("invalid state transition {from} -> {to}"),
            ));
            self.updated_at = Utc::now();
        }
        Err(TaskError::InvalidStateTransition { from, to })
    }

    /// Fatal failure path: record the error and force FAILED.  No-op when
    /// already terminal.
    pub fn force_fail(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Failed;
        self.error = Some((kind.into(), message.into()));
        self.updated_at = Utc::now();
    }

    /// Cancellation path.  No-op when already terminal.
    pub fn force_cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TaskState::Cancelled;
        self.updated_at = Utc::now();
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> TaskFsm {
        TaskFsm::new(
            TaskId::from("t-1"),
            ChannelCoordinate::new("cli", "main"),
            "do the thing",
        )
    }

    #[test]
    fn happy_path_walks_the_table() {
        let mut f = fsm();
        for to in [
            TaskState::Reasoning,
            TaskState::Planning,
            TaskState::Acting,
            TaskState::Acting, // next step
            TaskState::Reflecting,
            TaskState::Reasoning, // loop continues
            TaskState::Planning,
            TaskState::Acting,
            TaskState::Reflecting,
            TaskState::Completed,
        ] {
            f.transition(to).unwrap();
        }
        assert!(f.is_terminal());
    }

    #[test]
    fn every_observed_pair_is_in_the_table() {
        // FSM legality invariant: walk a sequence and verify each observed
        // consecutive pair was accepted by the table.
        let mut f = fsm();
        let mut observed = vec![f.state()];
        for to in [TaskState::Reasoning, TaskState::Planning, TaskState::Acting] {
            f.transition(to).unwrap();
            observed.push(f.state());
        }
        for pair in observed.windows(2) {
            assert!(is_legal(pair[0], pair[1]));
        }
    }

    #[test]
    fn illegal_transition_fails_the_task() {
        let mut f = fsm();
        let err = f.transition(TaskState::Acting).unwrap_err();
        assert!(matches!(err, TaskError::InvalidStateTransition { .. }));
        assert_eq!(f.state(), TaskState::Failed);
        let (kind, msg) = f.error().unwrap();
        assert_eq!(kind, "InvalidStateTransition");
        assert!(msg.contains("PENDING -> ACTING"));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut f = fsm();
        f.transition(TaskState::Cancelled).unwrap();
        assert!(f.transition(TaskState::Reasoning).is_err());
        // Still cancelled — a terminal state is never overwritten.
        assert_eq!(f.state(), TaskState::Cancelled);
    }

    #[test]
    fn terminal_context_is_write_frozen() {
        let mut f = fsm();
        f.context_mut().unwrap().iteration = 3;
        f.force_fail("TaskError", "boom");
        assert!(f.context_mut().is_none());
        assert_eq!(f.context().iteration, 3);
    }

    #[test]
    fn force_fail_is_noop_after_terminal() {
        let mut f = fsm();
        f.force_cancel();
        f.force_fail("X", "y");
        assert_eq!(f.state(), TaskState::Cancelled);
        assert!(f.error().is_none());
    }

    #[test]
    fn cancellation_is_legal_from_every_live_state() {
        for intermediate in [
            vec![],
            vec![TaskState::Reasoning],
            vec![TaskState::Reasoning, TaskState::Planning],
            vec![TaskState::Reasoning, TaskState::Planning, TaskState::Acting],
            vec![
                TaskState::Reasoning,
                TaskState::Planning,
                TaskState::Acting,
                TaskState::Reflecting,
            ],
        ] {
            let mut f = fsm();
            for s in intermediate {
                f.transition(s).unwrap();
            }
            f.transition(TaskState::Cancelled).unwrap();
        }
    }
}
