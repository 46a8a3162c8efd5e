// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent shell: wires the bus, registries, executor, loop, and channel
//! mux, and exposes the narrow public surface
//! (`start`/`stop`/`submit`/`wait_for_task`/`on_task_complete`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use otto_bus::{
    ChannelCoordinate, Event, EventBus, EventFilter, EventId, EventPayload, EventType, Inbound,
    Subscriber, TaskId,
};
use otto_channels::{ChannelAdapter, ChannelMux, InboundSender, Outbound, ReplyTool};
use otto_config::Settings;
use otto_model::ModelRegistry;
use otto_tools::{CurrentTimeTool, ToolExecutor, ToolRegistry};

use crate::memory::{MemoryIndex, MemorySearchTool};
use crate::{ActionType, CognitiveLoop, TaskError, TaskHandle, TaskRegistry, TaskState};

const HISTORY_CAPACITY: usize = 1024;
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Agent {
    settings: Arc<Settings>,
    bus: EventBus,
    tasks: Arc<TaskRegistry>,
    models: Arc<ModelRegistry>,
    tools: Arc<ToolRegistry>,
    mux: Arc<ChannelMux>,
    cognitive: Arc<CognitiveLoop>,
    executor: Arc<ToolExecutor>,
    reply_bridge: Arc<ReplyOnComplete>,
    heartbeat: Mutex<Option<tokio::task::JoinHandle<()>>>,
    started: AtomicBool,
}

impl Agent {
    pub fn new(settings: Arc<Settings>) -> anyhow::Result<Self> {
        Self::with_memory(settings, None)
    }

    pub fn with_memory(
        settings: Arc<Settings>,
        memory: Option<Arc<dyn MemoryIndex>>,
    ) -> anyhow::Result<Self> {
        let bus = EventBus::with_history(HISTORY_CAPACITY);
        let tasks = Arc::new(TaskRegistry::new(settings.agent.max_active_tasks));
        let models = Arc::new(ModelRegistry::new(settings.llm.clone()));
        let tools = Arc::new(ToolRegistry::new());
        let mux = Arc::new(ChannelMux::new());

        tools
            .register(Arc::new(CurrentTimeTool))
            .context("registering current_time")?;
        tools
            .register(Arc::new(ReplyTool::new(Arc::clone(&mux))))
            .context("registering reply")?;
        if let Some(memory) = &memory {
            tools
                .register(Arc::new(MemorySearchTool::new(Arc::clone(memory))))
                .context("registering memory_search")?;
        }

        let executor = Arc::new(ToolExecutor::new(
            Arc::clone(&tools),
            bus.clone(),
            Duration::from_secs(settings.agent.task_timeout),
            settings.agent.max_concurrent_tools,
        ));
        let cognitive = Arc::new(CognitiveLoop::new(
            bus.clone(),
            Arc::clone(&tasks),
            Arc::clone(&models),
            Arc::clone(&tools),
            memory,
            &settings,
        ));
        let reply_bridge = Arc::new(ReplyOnComplete {
            tasks: Arc::clone(&tasks),
            mux: Arc::clone(&mux),
        });

        Ok(Self {
            settings,
            bus,
            tasks,
            models,
            tools,
            mux,
            cognitive,
            executor,
            reply_bridge,
            heartbeat: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Start the bus, wire the loop and executor, start the adapters, and
    /// announce `SYSTEM_STARTED`.  Idempotent.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bus.start();

        let loop_sub: Arc<dyn Subscriber> = self.cognitive.clone();
        for t in CognitiveLoop::handled_events() {
            self.bus.subscribe(EventFilter::Type(*t), loop_sub.clone());
        }
        self.bus.subscribe(
            EventFilter::Type(EventType::ToolCallRequested),
            self.executor.clone(),
        );
        self.bus.subscribe(
            EventFilter::Type(EventType::TaskCompleted),
            self.reply_bridge.clone(),
        );

        self.mux.start_all(&self.bus).await;
        self.start_heartbeat();
        self.bus.emit(Event::new(EventType::SystemStarted));
        info!("agent started");
    }

    /// Announce `SYSTEM_STOPPING`, stop adapters, drain the bus, stop the
    /// dispatcher.  Idempotent.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.bus.emit(Event::new(EventType::SystemStopping));
        self.mux.stop_all().await;
        if let Some(handle) = self.heartbeat.lock().expect("heartbeat slot poisoned").take() {
            handle.abort();
        }
        self.bus.drain().await;
        self.bus.stop().await;
        info!("agent stopped");
    }

    fn start_heartbeat(&self) {
        let period = self.settings.agent.heartbeat_interval;
        if period == 0 {
            return;
        }
        let bus = self.bus.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(period));
            interval.tick().await; // swallow the immediate first tick
            loop {
                interval.tick().await;
                bus.emit(Event::new(EventType::Heartbeat));
            }
        });
        *self.heartbeat.lock().expect("heartbeat slot poisoned") = Some(handle);
    }

    /// Inject text as a synthetic inbound message and return the task id
    /// allocated for it, resolved by observing the resulting
    /// `TASK_CREATED`.
    pub async fn submit(&self, text: impl Into<String>) -> anyhow::Result<TaskId> {
        let event = Event::new(EventType::MessageReceived)
            .with_source("system")
            .with_payload(EventPayload::Inbound(Inbound {
                text: text.into(),
                channel: ChannelCoordinate::new("system", "submit"),
                metadata: None,
            }));
        let parent_id = event.id();

        let (tx, rx) = oneshot::channel();
        let waiter: Arc<dyn Subscriber> = Arc::new(TaskCreatedWaiter {
            parent: parent_id,
            tx: Mutex::new(Some(tx)),
        });
        self.bus
            .subscribe(EventFilter::Type(EventType::TaskCreated), waiter.clone());

        self.bus.emit(event);
        let result = tokio::time::timeout(SUBMIT_TIMEOUT, rx).await;
        self.bus
            .unsubscribe(EventFilter::Type(EventType::TaskCreated), &waiter);
        match result {
            Ok(Ok(task_id)) => Ok(task_id),
            _ => anyhow::bail!("no task was created for the submitted message"),
        }
    }

    /// Resolve once the task reaches a terminal state.  A failed task
    /// rejects with its recorded error; a cancelled task rejects likewise.
    pub async fn wait_for_task(
        &self,
        id: &TaskId,
        timeout: Duration,
    ) -> Result<TaskHandle, TaskError> {
        let handle = self
            .tasks
            .get(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))?;

        if let Some(outcome) = Self::terminal_outcome(&handle, id) {
            return outcome;
        }

        let (tx, rx) = oneshot::channel();
        let waiter: Arc<dyn Subscriber> = Arc::new(TerminalWaiter {
            task: id.clone(),
            tx: Mutex::new(Some(tx)),
        });
        for t in [
            EventType::TaskCompleted,
            EventType::TaskFailed,
            EventType::TaskCancelled,
        ] {
            self.bus.subscribe(EventFilter::Type(t), waiter.clone());
        }

        let waited = tokio::time::timeout(timeout, rx).await;
        for t in [
            EventType::TaskCompleted,
            EventType::TaskFailed,
            EventType::TaskCancelled,
        ] {
            self.bus.unsubscribe(EventFilter::Type(t), &waiter);
        }
        if waited.is_err() {
            return Err(TaskError::WaitTimeout(id.clone()));
        }
        Self::terminal_outcome(&handle, id).unwrap_or(Err(TaskError::WaitTimeout(id.clone())))
    }

    fn terminal_outcome(
        handle: &TaskHandle,
        id: &TaskId,
    ) -> Option<Result<TaskHandle, TaskError>> {
        let fsm = handle.lock().expect("task poisoned");
        match fsm.state() {
            TaskState::Completed => Some(Ok(Arc::clone(handle))),
            TaskState::Failed => {
                let (kind, message) = fsm
                    .error()
                    .cloned()
                    .unwrap_or_else(|| ("TaskError".into(), "task failed".into()));
                Some(Err(TaskError::Failed {
                    task_id: id.clone(),
                    kind,
                    message,
                }))
            }
            TaskState::Cancelled => Some(Err(TaskError::Cancelled(id.clone()))),
            _ => None,
        }
    }

    /// One-shot callback, invoked asynchronously after the task's
    /// `TASK_COMPLETED` event is dispatched.
    pub fn on_task_complete(
        &self,
        id: &TaskId,
        callback: impl FnOnce(TaskHandle) + Send + 'static,
    ) {
        let hook: Arc<dyn Subscriber> = Arc::new(CompletionHook {
            task: id.clone(),
            tasks: Arc::clone(&self.tasks),
            callback: Mutex::new(Some(Box::new(callback))),
        });
        self.bus
            .subscribe(EventFilter::Type(EventType::TaskCompleted), hook);
    }

    /// Cancel a live task.  Subsequent events for it are dropped by the
    /// loop; an already-terminal task is left untouched.
    pub fn cancel(&self, id: &TaskId) -> Result<(), TaskError> {
        let handle = self
            .tasks
            .get(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.clone()))?;
        {
            let mut fsm = handle.lock().expect("task poisoned");
            if fsm.is_terminal() {
                debug!(task = %id, "cancel on terminal task is a no-op");
                return Ok(());
            }
            fsm.force_cancel();
        }
        self.bus.emit(
            Event::new(EventType::TaskCancelled)
                .with_task(id.clone())
                .with_payload(EventPayload::Error {
                    kind: "TaskCancelled".into(),
                    message: "task cancelled".into(),
                }),
        );
        Ok(())
    }

    /// Register a channel adapter.  When the agent is already running the
    /// adapter is started immediately.
    pub fn register_adapter(&self, adapter: Arc<dyn ChannelAdapter>) {
        self.mux.register(Arc::clone(&adapter));
        if self.started.load(Ordering::SeqCst) {
            let sender = InboundSender::new(self.bus.clone());
            tokio::spawn(async move {
                if let Err(e) = adapter.start(sender).await {
                    warn!(error = %e, "late adapter failed to start");
                }
            });
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn task_registry(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn model_registry(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn channel_mux(&self) -> &Arc<ChannelMux> {
        &self.mux
    }
}

// ── Bridge subscribers ────────────────────────────────────────────────────────

/// Resolves `submit` by matching the `TASK_CREATED` derived from the
/// synthesized message event.
struct TaskCreatedWaiter {
    parent: EventId,
    tx: Mutex<Option<oneshot::Sender<TaskId>>>,
}

#[async_trait]
impl Subscriber for TaskCreatedWaiter {
    fn name(&self) -> &str {
        "task-created-waiter"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        if event.parent_event_id() == Some(self.parent) {
            if let (Some(task_id), Some(tx)) = (
                event.task_id().cloned(),
                self.tx.lock().expect("waiter poisoned").take(),
            ) {
                let _ = tx.send(task_id);
            }
        }
        Ok(())
    }
}

/// Resolves `wait_for_task` on the first terminal event for the task.
struct TerminalWaiter {
    task: TaskId,
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl Subscriber for TerminalWaiter {
    fn name(&self) -> &str {
        "terminal-waiter"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        if event.task_id() == Some(&self.task) {
            if let Some(tx) = self.tx.lock().expect("waiter poisoned").take() {
                let _ = tx.send(());
            }
        }
        Ok(())
    }
}

/// One-shot completion callback, spawned so it runs after dispatch.
struct CompletionHook {
    task: TaskId,
    tasks: Arc<TaskRegistry>,
    #[allow(clippy::type_complexity)]
    callback: Mutex<Option<Box<dyn FnOnce(TaskHandle) + Send>>>,
}

#[async_trait]
impl Subscriber for CompletionHook {
    fn name(&self) -> &str {
        "completion-hook"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        if event.task_id() != Some(&self.task) {
            return Ok(());
        }
        let (Some(callback), Some(handle)) = (
            self.callback.lock().expect("hook poisoned").take(),
            self.tasks.get(&self.task),
        ) else {
            return Ok(());
        };
        tokio::spawn(async move { callback(handle) });
        Ok(())
    }
}

/// Delivers the final reply of a completed task to its originating
/// channel — unless the task already replied through the `reply` tool, or
/// originated from the synthetic `system` channel.
struct ReplyOnComplete {
    tasks: Arc<TaskRegistry>,
    mux: Arc<ChannelMux>,
}

impl ReplyOnComplete {
    // The plan is rebuilt every iteration, so look at the accumulated step
    // results rather than the final plan: a reply sent in an earlier
    // iteration still counts.
    fn already_replied(handle: &TaskHandle) -> bool {
        let fsm = handle.lock().expect("task poisoned");
        fsm.context().actions_done.iter().any(|r| {
            r.action_type == ActionType::ToolCall
                && r.success
                && !r.is_pending()
                && r.action_input["toolName"] == "reply"
        })
    }
}

#[async_trait]
impl Subscriber for ReplyOnComplete {
    fn name(&self) -> &str {
        "reply-on-complete"
    }

    async fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        let EventPayload::FinalResult { task_id, text, .. } = event.payload() else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        let Some(handle) = self.tasks.get(task_id) else {
            return Ok(());
        };
        let channel = handle.lock().expect("task poisoned").context().channel.clone();
        if channel.channel_type == "system" {
            return Ok(());
        }
        if Self::already_replied(&handle) {
            debug!(task = %task_id, "final reply already delivered via reply tool");
            return Ok(());
        }
        self.mux
            .deliver(&Outbound {
                text: text.clone(),
                channel,
            })
            .await;
        Ok(())
    }
}
