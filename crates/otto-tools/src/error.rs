// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// Errors raised by tool registration and execution.
///
/// Execution-path failures (unknown tool, validation, timeout) are normally
/// carried inside a failed `ToolOutput` so the task can reflect on them;
/// this enum covers the cases that are errors to the *caller*.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool \"{0}\" already registered")]
    AlreadyRegistered(String),
    #[error("Tool {0} not found")]
    NotFound(String),
    #[error("Tool {name} timed out after {ms}ms")]
    Timeout { name: String, ms: u64 },
    #[error("{0}")]
    Execution(String),
}
