// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `reply` tool: the actor's way of shipping text back to a channel.
//!
//! When the model calls `reply {text, channelId}`, the outbound is routed
//! through the mux to the adapter matching the originating task's channel
//! type — the tool never picks an adapter itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use otto_bus::ChannelCoordinate;
use otto_tools::{ParamKind, ParametersSchema, Tool, ToolCall, ToolCategory, ToolContext, ToolOutput};

use crate::{ChannelMux, Outbound};

pub struct ReplyTool {
    mux: Arc<ChannelMux>,
}

impl ReplyTool {
    pub fn new(mux: Arc<ChannelMux>) -> Self {
        Self { mux }
    }
}

#[async_trait]
impl Tool for ReplyTool {
    fn name(&self) -> &str {
        "reply"
    }

    fn description(&self) -> &str {
        "Send a reply message to the user on the originating channel"
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Channel
    }

    fn parameters(&self) -> ParametersSchema {
        ParametersSchema::new()
            .required("text", ParamKind::String, "the message text to send")
            .required(
                "channelId",
                ParamKind::String,
                "identifier of the conversation to reply into",
            )
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutput {
        let text = call.args["text"].as_str().unwrap_or_default().to_string();
        let channel_id = call.args["channelId"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let Some(origin) = &ctx.channel else {
            return ToolOutput::failure("reply has no originating channel");
        };

        let outbound = Outbound {
            text,
            channel: ChannelCoordinate {
                channel_type: origin.channel_type.clone(),
                channel_id,
                user_id: None,
                reply_to: origin.reply_to.clone(),
            },
        };
        // Unknown types and delivery failures are absorbed by the mux; the
        // tool call itself still succeeds so the task is not re-driven.
        self.mux.deliver(&outbound).await;
        ToolOutput::ok(json!({"delivered": true, "channelId": outbound.channel.channel_id}))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::RecordingAdapter;

    fn call_with(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "reply-1".into(),
            name: "reply".into(),
            args,
        }
    }

    #[tokio::test]
    async fn routes_reply_to_matching_adapter_type() {
        let mux = Arc::new(ChannelMux::new());
        let telegram = Arc::new(RecordingAdapter::new("telegram"));
        let cli = Arc::new(RecordingAdapter::new("cli"));
        mux.register(telegram.clone());
        mux.register(cli.clone());

        let tool = ReplyTool::new(Arc::clone(&mux));
        let ctx = ToolContext {
            task_id: None,
            channel: Some(ChannelCoordinate::new("telegram", "tg-123")),
        };
        let out = tool
            .execute(
                &call_with(json!({"text": "Hello!", "channelId": "tg-123"})),
                &ctx,
            )
            .await;

        assert!(out.success);
        let tg = telegram.deliveries();
        assert_eq!(tg.len(), 1);
        assert_eq!(tg[0].text, "Hello!");
        assert_eq!(tg[0].channel.channel_id, "tg-123");
        assert!(cli.deliveries().is_empty());
    }

    #[tokio::test]
    async fn missing_origin_channel_fails() {
        let tool = ReplyTool::new(Arc::new(ChannelMux::new()));
        let out = tool
            .execute(
                &call_with(json!({"text": "x", "channelId": "y"})),
                &ToolContext::default(),
            )
            .await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn unknown_adapter_type_still_succeeds() {
        let tool = ReplyTool::new(Arc::new(ChannelMux::new()));
        let ctx = ToolContext {
            task_id: None,
            channel: Some(ChannelCoordinate::new("nowhere", "n-1")),
        };
        let out = tool
            .execute(&call_with(json!({"text": "x", "channelId": "n-1"})), &ctx)
            .await;
        assert!(out.success, "drop-and-log must not fail the step");
    }

    #[test]
    fn schema_requires_text_and_channel_id() {
        let tool = ReplyTool::new(Arc::new(ChannelMux::new()));
        let schema = tool.parameters();
        assert!(schema.validate(&json!({"text": "a", "channelId": "b"})).is_ok());
        assert!(schema.validate(&json!({"text": "a"})).is_err());
    }
}
