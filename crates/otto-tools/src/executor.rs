// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool execution with validation, timeout, and lifecycle events.
//!
//! The executor is the only consumer of `TOOL_CALL_REQUESTED`.  Each request
//! is offloaded to its own task — bounded by the shared semaphore — so a
//! slow tool never blocks the bus dispatcher; the completion posts a
//! `TOOL_CALL_COMPLETED` / `TOOL_CALL_FAILED` event linked by the call id.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use otto_bus::{Event, EventBus, EventPayload, EventType, Subscriber};

use crate::{ToolCall, ToolContext, ToolOutput, ToolRegistry};

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    bus: EventBus,
    timeout: Duration,
    gate: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        bus: EventBus,
        timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry,
            bus,
            timeout,
            gate: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Execute one tool call to completion.
    ///
    /// Failure shapes, all returned rather than raised:
    /// - unknown name → `Tool {name} not found`
    /// - argument validation failure → the validator's message
    /// - timeout → `Tool {name} timed out after {ms}ms`
    /// - a failed `ToolOutput` from the tool itself is passed through
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let Some(tool) = self.registry.get(name) else {
            return ToolOutput::failure(format!("Tool {name} not found"));
        };

        // Tools carrying a pre-baked JSON Schema (MCP imports) are validated
        // by the owning server; only structured schemas are checked here.
        if tool.parameters_json_schema().is_none() {
            if let Err(msg) = tool.parameters().validate(&args) {
                return ToolOutput::failure(msg);
            }
        }

        let call = ToolCall {
            id: ctx
                .task_id
                .as_ref()
                .map(|t| format!("{t}-call"))
                .unwrap_or_else(|| "call".into()),
            name: name.to_string(),
            args,
        };

        let started = Instant::now();
        let output = match tokio::time::timeout(self.timeout, tool.execute(&call, ctx)).await {
            Ok(output) => output,
            Err(_) => ToolOutput::failure(format!(
                "Tool {name} timed out after {}ms",
                self.timeout.as_millis()
            )),
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        self.registry
            .update_call_stats(name, duration_ms, output.success);
        debug!(tool = name, success = output.success, duration_ms, "tool executed");
        output
    }

    fn spawn_call(
        &self,
        request: Event,
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        step_index: usize,
        ctx: ToolContext,
    ) {
        let exec = self.clone();
        tokio::spawn(async move {
            let permit = exec.gate.clone().acquire_owned().await;
            if permit.is_err() {
                warn!(tool = %tool_name, "tool gate closed; dropping call");
                return;
            }
            let started = Instant::now();
            let output = exec.execute(&tool_name, arguments, &ctx).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let event_type = if output.success {
                EventType::ToolCallCompleted
            } else {
                EventType::ToolCallFailed
            };
            exec.bus.emit(
                Event::derive(&request, event_type).with_payload(EventPayload::ToolCallResult {
                    tool_call_id,
                    step_index,
                    success: output.success,
                    result: output.result,
                    error: output.error,
                    duration_ms,
                }),
            );
        });
    }
}

#[async_trait]
impl Subscriber for ToolExecutor {
    fn name(&self) -> &str {
        "tool-executor"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        if let EventPayload::ToolCallRequested {
            tool_call_id,
            tool_name,
            arguments,
            step_index,
            channel,
        } = event.payload()
        {
            let ctx = ToolContext {
                task_id: event.task_id().cloned(),
                channel: channel.clone(),
            };
            self.spawn_call(
                event.clone(),
                tool_call_id.clone(),
                tool_name.clone(),
                arguments.clone(),
                *step_index,
                ctx,
            );
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::{ParamKind, ParametersSchema, Tool, ToolCategory};
    use otto_bus::{EventFilter, TaskId};

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> &str {
            "adds two integers"
        }
        fn parameters(&self) -> ParametersSchema {
            ParametersSchema::new()
                .required("a", ParamKind::Integer, "left operand")
                .required("b", ParamKind::Integer, "right operand")
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
            let a = call.args["a"].as_i64().unwrap_or(0);
            let b = call.args["b"].as_i64().unwrap_or(0);
            ToolOutput::ok(json!(a + b))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn parameters(&self) -> ParametersSchema {
            ParametersSchema::new()
        }
        async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ToolOutput::ok_text("too late")
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters(&self) -> ParametersSchema {
            ParametersSchema::new()
        }
        async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
            ToolOutput::failure("disk on fire")
        }
    }

    fn executor_with(tools: Vec<Arc<dyn Tool>>, timeout: Duration) -> (ToolExecutor, EventBus) {
        let registry = Arc::new(ToolRegistry::new());
        for t in tools {
            registry.register(t).unwrap();
        }
        let bus = EventBus::with_history(64);
        let exec = ToolExecutor::new(registry, bus.clone(), timeout, 3);
        (exec, bus)
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let (exec, _) = executor_with(vec![], Duration::from_secs(1));
        let out = exec
            .execute("ghost", json!({}), &ToolContext::default())
            .await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("Tool ghost not found"));
    }

    #[tokio::test]
    async fn validation_failure_is_returned() {
        let (exec, _) = executor_with(vec![Arc::new(AddTool)], Duration::from_secs(1));
        let out = exec
            .execute("add", json!({"a": 1}), &ToolContext::default())
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("missing required parameter \"b\""));
    }

    #[tokio::test]
    async fn successful_execution_returns_result() {
        let (exec, _) = executor_with(vec![Arc::new(AddTool)], Duration::from_secs(1));
        let out = exec
            .execute("add", json!({"a": 2, "b": 3}), &ToolContext::default())
            .await;
        assert!(out.success);
        assert_eq!(out.result, Some(json!(5)));
    }

    #[tokio::test]
    async fn timeout_produces_timed_out_error() {
        let (exec, _) = executor_with(vec![Arc::new(SlowTool)], Duration::from_millis(20));
        let out = exec
            .execute("slow", json!({}), &ToolContext::default())
            .await;
        assert!(!out.success);
        let msg = out.error.unwrap();
        assert!(msg.contains("timed out"), "got: {msg}");
        assert!(msg.contains("20ms"));
    }

    #[tokio::test]
    async fn tool_failure_is_passed_through() {
        let (exec, _) = executor_with(vec![Arc::new(FailingTool)], Duration::from_secs(1));
        let out = exec
            .execute("failing", json!({}), &ToolContext::default())
            .await;
        assert!(!out.success);
        assert_eq!(out.error.as_deref(), Some("disk on fire"));
    }

    #[tokio::test]
    async fn execution_updates_call_stats() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(AddTool)).unwrap();
        let bus = EventBus::new();
        let exec = ToolExecutor::new(registry.clone(), bus, Duration::from_secs(1), 3);
        exec.execute("add", json!({"a": 1, "b": 1}), &ToolContext::default())
            .await;
        let stats = registry.stats();
        assert_eq!(stats.call_stats["add"].count, 1);
        assert_eq!(stats.call_stats["add"].failures, 0);
    }

    #[tokio::test]
    async fn request_event_yields_completion_event_linked_by_call_id() {
        let (exec, bus) = executor_with(vec![Arc::new(AddTool)], Duration::from_secs(1));
        bus.subscribe(
            EventFilter::Type(EventType::ToolCallRequested),
            Arc::new(exec),
        );
        bus.start();

        bus.emit(
            Event::new(EventType::ToolCallRequested)
                .with_task(TaskId::from("t-1"))
                .with_payload(EventPayload::ToolCallRequested {
                    tool_call_id: "call-7".into(),
                    tool_name: "add".into(),
                    arguments: json!({"a": 20, "b": 22}),
                    step_index: 0,
                    channel: None,
                }),
        );

        // The completion is posted from a worker task; poll history briefly.
        let mut completed = None;
        for _ in 0..50 {
            bus.drain().await;
            completed = bus
                .history()
                .into_iter()
                .find(|e| e.event_type() == EventType::ToolCallCompleted);
            if completed.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let completed = completed.expect("completion event");
        match completed.payload() {
            EventPayload::ToolCallResult {
                tool_call_id,
                success,
                result,
                ..
            } => {
                assert_eq!(tool_call_id, "call-7");
                assert!(success);
                assert_eq!(result, &Some(json!(42)));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(completed.task_id(), Some(&TaskId::from("t-1")));
        bus.stop().await;
    }

    #[tokio::test]
    async fn failed_tool_yields_tool_call_failed_event() {
        let (exec, bus) = executor_with(vec![Arc::new(FailingTool)], Duration::from_secs(1));
        bus.subscribe(
            EventFilter::Type(EventType::ToolCallRequested),
            Arc::new(exec),
        );
        bus.start();
        bus.emit(
            Event::new(EventType::ToolCallRequested)
                .with_task(TaskId::from("t-1"))
                .with_payload(EventPayload::ToolCallRequested {
                    tool_call_id: "call-8".into(),
                    tool_name: "failing".into(),
                    arguments: json!({}),
                    step_index: 0,
                    channel: None,
                }),
        );
        let mut failed = None;
        for _ in 0..50 {
            bus.drain().await;
            failed = bus
                .history()
                .into_iter()
                .find(|e| e.event_type() == EventType::ToolCallFailed);
            if failed.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(failed.is_some());
        bus.stop().await;
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_gate() {
        struct GaugeTool {
            current: Arc<AtomicUsize>,
            peak: Arc<Mutex<usize>>,
        }

        #[async_trait]
        impl Tool for GaugeTool {
            fn name(&self) -> &str {
                "gauge"
            }
            fn description(&self) -> &str {
                "tracks concurrency"
            }
            fn parameters(&self) -> ParametersSchema {
                ParametersSchema::new()
            }
            fn category(&self) -> ToolCategory {
                ToolCategory::General
            }
            async fn execute(&self, _call: &ToolCall, _ctx: &ToolContext) -> ToolOutput {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                {
                    let mut peak = self.peak.lock().unwrap();
                    *peak = (*peak).max(now);
                }
                tokio::time::sleep(Duration::from_millis(30)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                ToolOutput::ok_text("done")
            }
        }

        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(Mutex::new(0));
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(Arc::new(GaugeTool {
                current: current.clone(),
                peak: peak.clone(),
            }))
            .unwrap();
        let bus = EventBus::new();
        let exec = ToolExecutor::new(registry, bus.clone(), Duration::from_secs(2), 1);
        bus.subscribe(
            EventFilter::Type(EventType::ToolCallRequested),
            Arc::new(exec),
        );
        bus.start();

        for i in 0..3 {
            bus.emit(
                Event::new(EventType::ToolCallRequested).with_payload(
                    EventPayload::ToolCallRequested {
                        tool_call_id: format!("c-{i}"),
                        tool_name: "gauge".into(),
                        arguments: json!({}),
                        step_index: i,
                        channel: None,
                    },
                ),
            );
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*peak.lock().unwrap(), 1, "semaphore of 1 must serialize");
        bus.stop().await;
    }
}
