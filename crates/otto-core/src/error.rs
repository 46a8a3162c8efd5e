// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use otto_bus::TaskId;

use crate::TaskState;

/// Task-level failures.
///
/// `InvalidStateTransition` is fatal for the task: the FSM records the
/// failure and the loop surfaces a `TASK_FAILED` event.  `Failed` and
/// `Cancelled` are the shapes `wait_for_task` rejects with.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("invalid state transition {from} -> {to}")]
    InvalidStateTransition { from: TaskState, to: TaskState },
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("active task limit reached ({0})")]
    ActiveLimitReached(usize),
    #[error("task {task_id} failed ({kind}): {message}")]
    Failed {
        task_id: TaskId,
        kind: String,
        message: String,
    },
    #[error("task {0} cancelled")]
    Cancelled(TaskId),
    #[error("timed out waiting for task {0}")]
    WaitTimeout(TaskId),
}

/// Memory subsystem failure.  Surfaced to the cognitive phase but never
/// fatal: a task reasons without memory rather than dying.
#[derive(Debug, thiserror::Error)]
#[error("memory error: {0}")]
pub struct MemoryError(pub String);
