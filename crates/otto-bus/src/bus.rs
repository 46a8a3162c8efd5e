// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Priority-ordered cooperative event dispatcher.
//!
//! A single dispatcher task drains a priority queue: at each tick it pops
//! the most urgent event (lowest effective priority, FIFO within ties),
//! runs every matching subscriber in sequence, and only then pops the next
//! event.  Long-running work must not live inside a subscriber — offload it
//! with `tokio::spawn` and post a follow-up event carrying a correlation id.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, warn};

use crate::history::History;
use crate::{Event, EventPayload, EventType};

/// A bus subscriber.  Registered once per `(filter, instance)` pair —
/// re-registering the same `Arc` for the same filter is a no-op.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Name used in dispatch failure logs.
    fn name(&self) -> &str {
        "subscriber"
    }

    /// Handle one event.  An `Err` is contained by the bus: it is logged
    /// with the event id, the remaining subscribers still run, and — when
    /// the event belongs to a task — a failure event is emitted on the
    /// task's behalf.
    async fn on_event(&self, event: &Event) -> anyhow::Result<()>;
}

/// What a subscription matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    Type(EventType),
    /// Wildcard: dispatched after all exact-type subscribers.
    Any,
}

#[derive(Default)]
struct SubscriberTable {
    exact: HashMap<EventType, Vec<Arc<dyn Subscriber>>>,
    wildcard: Vec<Arc<dyn Subscriber>>,
}

struct QueuedEvent {
    priority: u16,
    seq: u64,
    event: Arc<Event>,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap; invert the ordering so `pop` yields the lowest
// (priority, seq) pair — most urgent first, FIFO within a priority.
impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

struct Inner {
    queue: Mutex<BinaryHeap<QueuedEvent>>,
    seq: AtomicU64,
    queue_notify: Notify,
    running: AtomicBool,
    busy_tx: watch::Sender<bool>,
    subscribers: RwLock<SubscriberTable>,
    history: Option<Mutex<History>>,
}

impl Inner {
    fn pending(&self) -> usize {
        self.queue.lock().expect("bus queue poisoned").len()
    }

    fn push(&self, event: Arc<Event>) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue
            .lock()
            .expect("bus queue poisoned")
            .push(QueuedEvent {
                priority: event.effective_priority(),
                seq,
                event,
            });
        let _ = self.busy_tx.send_replace(true);
        self.queue_notify.notify_one();
    }

    async fn dispatch(&self, event: Arc<Event>) {
        if let Some(history) = &self.history {
            history
                .lock()
                .expect("bus history poisoned")
                .push(Arc::clone(&event));
        }

        let targets: Vec<Arc<dyn Subscriber>> = {
            let table = self.subscribers.read().expect("subscriber table poisoned");
            let mut targets = Vec::new();
            if let Some(exact) = table.exact.get(&event.event_type()) {
                targets.extend(exact.iter().cloned());
            }
            targets.extend(table.wildcard.iter().cloned());
            targets
        };

        for sub in targets {
            let outcome = std::panic::AssertUnwindSafe(sub.on_event(&event))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        event = %event.id(),
                        event_type = %event.event_type(),
                        handler = sub.name(),
                        error = %e,
                        "event handler failed"
                    );
                    self.convert_failure(&event, e.to_string());
                }
                Err(_) => {
                    error!(
                        event = %event.id(),
                        event_type = %event.event_type(),
                        handler = sub.name(),
                        "event handler panicked"
                    );
                    self.convert_failure(&event, "handler panicked".into());
                }
            }
        }
    }

    /// Turn a handler failure into a typed event when it is attributable to
    /// a task.  Failures while handling an already-failed event are only
    /// logged — re-emitting would loop.
    fn convert_failure(&self, event: &Event, message: String) {
        if event.task_id().is_none() {
            return;
        }
        if matches!(
            event.event_type(),
            EventType::TaskFailed | EventType::ToolCallFailed | EventType::TaskCancelled
        ) {
            return;
        }
        let failure_type = if event.event_type().is_tool() {
            EventType::ToolCallFailed
        } else {
            EventType::TaskFailed
        };
        let failure = Event::derive(event, failure_type).with_payload(EventPayload::Error {
            kind: "HandlerError".into(),
            message,
        });
        self.push(Arc::new(failure));
    }

    async fn run(self: Arc<Self>) {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let next = self.queue.lock().expect("bus queue poisoned").pop();
            match next {
                Some(q) => {
                    self.dispatch(q.event).await;
                    if self.pending() == 0 {
                        let _ = self.busy_tx.send_replace(false);
                    }
                }
                None => {
                    let _ = self.busy_tx.send_replace(false);
                    self.queue_notify.notified().await;
                }
            }
        }
        let _ = self.busy_tx.send_replace(false);
        debug!("event dispatcher stopped");
    }
}

/// Handle to the event bus.  Cheap to clone; all clones share one queue,
/// one subscriber table, and one dispatcher.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
    dispatcher: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl EventBus {
    /// Bus without history retention.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bus retaining the last `capacity` dispatched events.
    pub fn with_history(capacity: usize) -> Self {
        Self::build(Some(capacity))
    }

    fn build(history: Option<usize>) -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(BinaryHeap::new()),
                seq: AtomicU64::new(0),
                queue_notify: Notify::new(),
                running: AtomicBool::new(false),
                busy_tx,
                subscribers: RwLock::new(SubscriberTable::default()),
                history: history.map(|cap| Mutex::new(History::new(cap))),
            }),
            dispatcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a subscriber.  Idempotent for the same `(filter, instance)`
    /// pair; distinct instances of the same type are distinct subscribers.
    pub fn subscribe(&self, filter: EventFilter, sub: Arc<dyn Subscriber>) {
        let mut table = self
            .inner
            .subscribers
            .write()
            .expect("subscriber table poisoned");
        let list = match filter {
            EventFilter::Type(t) => table.exact.entry(t).or_default(),
            EventFilter::Any => &mut table.wildcard,
        };
        if list.iter().any(|s| Arc::ptr_eq(s, &sub)) {
            return;
        }
        list.push(sub);
    }

    /// Remove a subscriber.  No-op when not registered.
    pub fn unsubscribe(&self, filter: EventFilter, sub: &Arc<dyn Subscriber>) {
        let mut table = self
            .inner
            .subscribers
            .write()
            .expect("subscriber table poisoned");
        let list = match filter {
            EventFilter::Type(t) => match table.exact.get_mut(&t) {
                Some(list) => list,
                None => return,
            },
            EventFilter::Any => &mut table.wildcard,
        };
        list.retain(|s| !Arc::ptr_eq(s, sub));
    }

    /// Queue an event for dispatch.  Never blocks and never fails; the
    /// returned `Arc` lets callers correlate follow-up events by id.
    pub fn emit(&self, event: Event) -> Arc<Event> {
        let event = Arc::new(event);
        self.inner.push(Arc::clone(&event));
        event
    }

    /// Begin draining the queue.  Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.run());
        *self.dispatcher.lock().expect("dispatcher slot poisoned") = Some(handle);
    }

    /// Stop draining after the in-flight event completes.  Idempotent.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.queue_notify.notify_one();
        let handle = self
            .dispatcher
            .lock()
            .expect("dispatcher slot poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Wait until the queue is empty and no event is mid-dispatch.
    pub async fn drain(&self) {
        let mut rx = self.inner.busy_tx.subscribe();
        // wait_for checks the current value first, so a bus that is already
        // idle returns immediately.
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending()
    }

    /// Dispatched events, oldest first.  Empty when history is disabled.
    pub fn history(&self) -> Vec<Arc<Event>> {
        match &self.inner.history {
            Some(h) => h.lock().expect("bus history poisoned").snapshot(),
            None => Vec::new(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
