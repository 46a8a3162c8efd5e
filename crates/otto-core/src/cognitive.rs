// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The cognitive loop driver.
//!
//! Binds the reasoning phases to bus events: it is the only consumer of
//! `MESSAGE_RECEIVED` and the only producer of task-lifecycle and cognitive
//! events.  Handlers are straight-line: anything that suspends (the model
//! call, the memory fetch) runs in a spawned worker whose completion posts
//! the next event.  Events for terminal tasks are dropped at the door, so
//! cancellation quiesces a task without unwinding in-flight workers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use otto_bus::{Event, EventBus, EventPayload, EventType, Subscriber};
use otto_config::Settings;
use otto_model::{Message, ModelRegistry, ToolSchema};
use otto_tools::ToolRegistry;

use crate::memory::{MemoryIndex, MemoryIndexEntry};
use crate::phases::{actor, planner, reflector, thinker};
use crate::{stringify_content, FinalResult, TaskHandle, TaskRegistry, TaskState};

#[derive(Clone)]
pub struct CognitiveLoop {
    bus: EventBus,
    tasks: Arc<TaskRegistry>,
    models: Arc<ModelRegistry>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn MemoryIndex>>,
    llm_gate: Arc<Semaphore>,
    max_iterations: u32,
}

impl CognitiveLoop {
    pub fn new(
        bus: EventBus,
        tasks: Arc<TaskRegistry>,
        models: Arc<ModelRegistry>,
        tools: Arc<ToolRegistry>,
        memory: Option<Arc<dyn MemoryIndex>>,
        settings: &Settings,
    ) -> Self {
        Self {
            bus,
            tasks,
            models,
            tools,
            memory,
            llm_gate: Arc::new(Semaphore::new(settings.llm.max_concurrent_calls.max(1) as usize)),
            max_iterations: settings.agent.max_cognitive_iterations.max(1),
        }
    }

    /// The event types this loop must be subscribed to.
    pub fn handled_events() -> &'static [EventType] {
        &[
            EventType::MessageReceived,
            EventType::TaskCreated,
            EventType::ReasonDone,
            EventType::PlanDone,
            EventType::StepRequested,
            EventType::StepCompleted,
            EventType::ReflectDone,
            EventType::ToolCallCompleted,
            EventType::ToolCallFailed,
            EventType::TaskFailed,
        ]
    }

    /// Resolve the live task for an event; `None` drops the event (unknown
    /// task, or task already terminal).
    fn task_for(&self, event: &Event) -> Option<TaskHandle> {
        let id = event.task_id()?;
        let handle = self.tasks.get(id)?;
        if handle.lock().expect("task poisoned").is_terminal() {
            debug!(task = %id, event_type = %event.event_type(), "dropping event for terminal task");
            return None;
        }
        Some(handle)
    }

    fn fail_task(bus: &EventBus, handle: &TaskHandle, parent: &Event, kind: &str, message: String) {
        handle
            .lock()
            .expect("task poisoned")
            .force_fail(kind, message.clone());
        bus.emit(
            Event::derive(parent, EventType::TaskFailed).with_payload(EventPayload::Error {
                kind: kind.into(),
                message,
            }),
        );
    }

    /// Apply a transition; on violation the FSM has already failed the task
    /// and we surface the `TASK_FAILED` event.
    fn transition_or_fail(&self, handle: &TaskHandle, parent: &Event, to: TaskState) -> bool {
        let result = handle.lock().expect("task poisoned").transition(to);
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "fatal task transition");
                self.bus.emit(
                    Event::derive(parent, EventType::TaskFailed).with_payload(
                        EventPayload::Error {
                            kind: "InvalidStateTransition".into(),
                            message: e.to_string(),
                        },
                    ),
                );
                false
            }
        }
    }

    // ── MESSAGE_RECEIVED ──────────────────────────────────────────────────────

    fn on_message(&self, event: &Event) {
        let EventPayload::Inbound(inbound) = event.payload() else {
            return;
        };
        match self
            .tasks
            .create(inbound.channel.clone(), inbound.text.clone())
        {
            Ok((id, _handle)) => {
                self.bus.emit(
                    Event::derive(event, EventType::TaskCreated)
                        .with_task(id)
                        .with_payload(EventPayload::TaskCreated {
                            input_text: inbound.text.clone(),
                            channel: inbound.channel.clone(),
                        }),
                );
            }
            Err(e) => {
                warn!(error = %e, text = %inbound.text, "dropping inbound message; intake rejected");
            }
        }
    }

    // ── REASONING ─────────────────────────────────────────────────────────────

    /// Enter (or re-enter) REASONING and offload the thinker call.
    fn start_reasoning(&self, handle: TaskHandle, parent: &Event) {
        if !self.transition_or_fail(&handle, parent, TaskState::Reasoning) {
            return;
        }
        let messages: Vec<Message> = {
            let mut fsm = handle.lock().expect("task poisoned");
            let Some(ctx) = fsm.context_mut() else {
                return;
            };
            ctx.iteration += 1;
            thinker::ensure_input_message(ctx);
            ctx.messages.clone()
        };
        let tools_wire: Vec<ToolSchema> = self
            .tools
            .to_llm_tools()
            .into_iter()
            .map(|t| ToolSchema {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            })
            .collect();

        let model = match self.models.get("default") {
            Ok(m) => m,
            Err(e) => {
                let kind = e.kind().to_string();
                Self::fail_task(&self.bus, &handle, parent, &kind, e.to_string());
                return;
            }
        };

        let driver = self.clone();
        let parent = parent.clone();
        tokio::spawn(async move {
            let Ok(_permit) = driver.llm_gate.clone().acquire_owned().await else {
                return;
            };
            let memory_entries = driver.load_memory(&handle).await;
            match thinker::run(&model, messages, tools_wire, memory_entries.as_deref()).await {
                Ok(reasoning) => {
                    {
                        let mut fsm = handle.lock().expect("task poisoned");
                        if fsm.is_terminal() {
                            return;
                        }
                        if let Some(ctx) = fsm.context_mut() {
                            ctx.reasoning = Some(reasoning);
                        }
                    }
                    driver.bus.emit(Event::derive(&parent, EventType::ReasonDone));
                }
                Err(e) => {
                    let kind = e.kind().to_string();
                    Self::fail_task(&driver.bus, &handle, &parent, &kind, e.to_string());
                }
            }
        });
    }

    /// Fetch the memory index once per task; failures are non-fatal.
    async fn load_memory(&self, handle: &TaskHandle) -> Option<Vec<MemoryIndexEntry>> {
        let cached = handle
            .lock()
            .expect("task poisoned")
            .context()
            .memory_index
            .clone();
        if cached.is_some() {
            return cached;
        }
        let index = self.memory.as_ref()?;
        match index.index().await {
            Ok(entries) => {
                if let Some(ctx) = handle.lock().expect("task poisoned").context_mut() {
                    ctx.memory_index = Some(entries.clone());
                }
                Some(entries)
            }
            Err(e) => {
                warn!(error = %e, "memory index unavailable; reasoning without it");
                None
            }
        }
    }

    // ── PLANNING / ACTING ─────────────────────────────────────────────────────

    fn on_reason_done(&self, event: &Event, handle: TaskHandle) {
        if !self.transition_or_fail(&handle, event, TaskState::Planning) {
            return;
        }
        {
            let mut fsm = handle.lock().expect("task poisoned");
            let plan = planner::run(fsm.context());
            if let Some(ctx) = fsm.context_mut() {
                ctx.plan = Some(plan);
            }
        }
        self.bus.emit(Event::derive(event, EventType::PlanDone));
    }

    fn on_plan_done(&self, event: &Event, handle: TaskHandle) {
        if !self.transition_or_fail(&handle, event, TaskState::Acting) {
            return;
        }
        self.bus.emit(
            Event::derive(event, EventType::StepRequested)
                .with_payload(EventPayload::Step { step_index: 0 }),
        );
    }

    fn on_step_requested(&self, event: &Event, handle: TaskHandle) {
        let EventPayload::Step { step_index } = event.payload() else {
            return;
        };
        let step_index = *step_index;
        let outcome = {
            let mut fsm = handle.lock().expect("task poisoned");
            let Some(ctx) = fsm.context_mut() else {
                return;
            };
            actor::run(ctx, step_index)
        };
        match outcome {
            actor::ActorOutcome::Completed(result) => {
                {
                    let mut fsm = handle.lock().expect("task poisoned");
                    if let Some(ctx) = fsm.context_mut() {
                        ctx.actions_done.push(result);
                        if let Some(step) = ctx
                            .plan
                            .as_mut()
                            .and_then(|p| p.steps.get_mut(step_index))
                        {
                            step.completed = true;
                        }
                    }
                }
                self.bus.emit(
                    Event::derive(event, EventType::StepCompleted)
                        .with_payload(EventPayload::Step { step_index }),
                );
            }
            actor::ActorOutcome::ToolPending {
                result,
                tool_call_id,
                tool_name,
                arguments,
            } => {
                let channel = {
                    let mut fsm = handle.lock().expect("task poisoned");
                    let Some(ctx) = fsm.context_mut() else {
                        return;
                    };
                    ctx.actions_done.push(result);
                    ctx.channel.clone()
                };
                self.bus.emit(
                    Event::derive(event, EventType::ToolCallRequested).with_payload(
                        EventPayload::ToolCallRequested {
                            tool_call_id,
                            tool_name,
                            arguments,
                            step_index,
                            channel: Some(channel),
                        },
                    ),
                );
            }
            actor::ActorOutcome::MissingStep => {
                Self::fail_task(
                    &self.bus,
                    &handle,
                    event,
                    "TaskError",
                    format!("plan has no step {step_index}"),
                );
            }
        }
    }

    fn on_tool_result(&self, event: &Event, handle: TaskHandle) {
        match event.payload() {
            EventPayload::ToolCallResult {
                tool_call_id,
                step_index,
                success,
                result,
                error,
                duration_ms,
            } => {
                {
                    let mut fsm = handle.lock().expect("task poisoned");
                    let Some(ctx) = fsm.context_mut() else {
                        return;
                    };
                    let Some(step_result) = ctx
                        .actions_done
                        .iter_mut()
                        .find(|r| r.step_index == *step_index && r.is_pending())
                    else {
                        debug!(tool_call_id = %tool_call_id, "stale tool result; no pending step");
                        return;
                    };
                    step_result.finish(*success, result.clone(), error.clone(), *duration_ms);
                    let content = if *success {
                        stringify_content(result.as_ref())
                    } else {
                        error.clone().unwrap_or_else(|| "tool failed".into())
                    };
                    ctx.messages
                        .push(Message::tool_result(tool_call_id.clone(), content));
                    if let Some(step) = ctx
                        .plan
                        .as_mut()
                        .and_then(|p| p.steps.get_mut(*step_index))
                    {
                        step.completed = true;
                    }
                }
                self.bus.emit(
                    Event::derive(event, EventType::StepCompleted)
                        .with_payload(EventPayload::Step {
                            step_index: *step_index,
                        }),
                );
            }
            // Bus-converted failures carry no call correlation; nothing to
            // complete.
            EventPayload::Error { message, .. } => {
                debug!(message = %message, "uncorrelated tool failure event");
            }
            _ => {}
        }
    }

    fn on_step_completed(&self, event: &Event, handle: TaskHandle) {
        let EventPayload::Step { step_index } = event.payload() else {
            return;
        };
        let total = handle
            .lock()
            .expect("task poisoned")
            .context()
            .plan
            .as_ref()
            .map(|p| p.steps.len())
            .unwrap_or(0);

        if step_index + 1 < total {
            // ACTING → ACTING: the next step of the same plan.
            if !self.transition_or_fail(&handle, event, TaskState::Acting) {
                return;
            }
            self.bus.emit(
                Event::derive(event, EventType::StepRequested).with_payload(EventPayload::Step {
                    step_index: step_index + 1,
                }),
            );
            return;
        }

        if !self.transition_or_fail(&handle, event, TaskState::Reflecting) {
            return;
        }
        {
            let mut fsm = handle.lock().expect("task poisoned");
            let reflection = reflector::run(fsm.context());
            if let Some(ctx) = fsm.context_mut() {
                ctx.reflections.push(reflection);
            }
        }
        self.bus.emit(Event::derive(event, EventType::ReflectDone));
    }

    // ── REFLECTION OUTCOME ────────────────────────────────────────────────────

    fn on_reflect_done(&self, event: &Event, handle: TaskHandle) {
        enum Decision {
            Loop,
            Complete(FinalResult),
        }

        let decision = {
            let mut fsm = handle.lock().expect("task poisoned");
            let ctx = fsm.context();
            let should_continue = ctx
                .reflections
                .last()
                .map(|r| r.should_continue)
                .unwrap_or(false);
            let cap_hit = ctx.iteration >= self.max_iterations;

            if should_continue && !cap_hit {
                Decision::Loop
            } else {
                let warning = (should_continue && cap_hit).then(|| {
                    format!(
                        "reached max cognitive iterations ({}); completing with best available response",
                        self.max_iterations
                    )
                });
                if let Some(w) = &warning {
                    warn!(task = %fsm.id(), "{w}");
                }
                let text = ctx
                    .last_response_text()
                    .map(str::to_string)
                    .or_else(|| ctx.reasoning.as_ref().map(|r| r.response.clone()))
                    .unwrap_or_default();
                let final_result = FinalResult {
                    task_id: fsm.id().clone(),
                    text,
                    iterations: ctx.iteration,
                    warning,
                };
                // Store before the transition: terminal contexts freeze.
                if let Some(ctx) = fsm.context_mut() {
                    ctx.final_result = Some(final_result.clone());
                }
                match fsm.transition(TaskState::Completed) {
                    Ok(()) => Decision::Complete(final_result),
                    Err(e) => {
                        drop(fsm);
                        self.bus.emit(
                            Event::derive(event, EventType::TaskFailed).with_payload(
                                EventPayload::Error {
                                    kind: "InvalidStateTransition".into(),
                                    message: e.to_string(),
                                },
                            ),
                        );
                        return;
                    }
                }
            }
        };

        match decision {
            Decision::Loop => self.start_reasoning(handle, event),
            Decision::Complete(final_result) => {
                self.bus.emit(
                    Event::derive(event, EventType::TaskCompleted).with_payload(
                        EventPayload::FinalResult {
                            task_id: final_result.task_id,
                            text: final_result.text,
                            iterations: final_result.iterations,
                            warning: final_result.warning,
                        },
                    ),
                );
            }
        }
    }
}

#[async_trait]
impl Subscriber for CognitiveLoop {
    fn name(&self) -> &str {
        "cognitive-loop"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        match event.event_type() {
            EventType::MessageReceived => self.on_message(event),
            EventType::TaskCreated => {
                if let Some(handle) = self.task_for(event) {
                    self.start_reasoning(handle, event);
                }
            }
            EventType::ReasonDone => {
                if let Some(handle) = self.task_for(event) {
                    self.on_reason_done(event, handle);
                }
            }
            EventType::PlanDone => {
                if let Some(handle) = self.task_for(event) {
                    self.on_plan_done(event, handle);
                }
            }
            EventType::StepRequested => {
                if let Some(handle) = self.task_for(event) {
                    self.on_step_requested(event, handle);
                }
            }
            EventType::ToolCallCompleted | EventType::ToolCallFailed => {
                if let Some(handle) = self.task_for(event) {
                    self.on_tool_result(event, handle);
                }
            }
            EventType::StepCompleted => {
                if let Some(handle) = self.task_for(event) {
                    self.on_step_completed(event, handle);
                }
            }
            EventType::ReflectDone => {
                if let Some(handle) = self.task_for(event) {
                    self.on_reflect_done(event, handle);
                }
            }
            // A TASK_FAILED may originate from the bus itself (a foreign
            // handler failed on this task's event); make the FSM agree.
            EventType::TaskFailed => {
                if let Some(handle) = event.task_id().and_then(|id| self.tasks.get(id)) {
                    let mut fsm = handle.lock().expect("task poisoned");
                    if !fsm.is_terminal() {
                        let (kind, message) = match event.payload() {
                            EventPayload::Error { kind, message } => {
                                (kind.clone(), message.clone())
                            }
                            _ => ("TaskError".into(), "task failed".into()),
                        };
                        fsm.force_fail(kind, message);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
