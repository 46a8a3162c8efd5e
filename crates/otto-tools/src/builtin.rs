// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::{ParametersSchema, Tool, ToolCall, ToolContext, ToolOutput};

/// Reports the current wall-clock time.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current UTC time as an ISO-8601 timestamp and a unix epoch value"
    }

    fn parameters(&self) -> ParametersSchema {
        ParametersSchema::new()
    }

    async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
        let now = Utc::now();
        ToolOutput::ok(json!({
            "iso": now.to_rfc3339(),
            "unix": now.timestamp(),
        }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
