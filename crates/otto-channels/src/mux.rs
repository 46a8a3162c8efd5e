// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Channel multiplexer: owns the registered adapters and bridges the bus.
//!
//! Inbound: each adapter receives an [`InboundSender`] at start and injects
//! messages itself.  Outbound: [`ChannelMux::deliver`] routes by
//! `channel.type`.  Routing is by type, not adapter identity — when two
//! adapters register the same type, the last one registered wins.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use otto_bus::EventBus;

use crate::{ChannelAdapter, InboundSender, Outbound};

type ReplyCallback = Arc<dyn Fn(&Outbound) + Send + Sync>;

pub struct ChannelMux {
    adapters: RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>,
    /// Direct observer for outbounds; retained for test scenarios that run
    /// with no adapters registered.
    on_reply: RwLock<Option<ReplyCallback>>,
}

impl ChannelMux {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            on_reply: RwLock::new(None),
        }
    }

    /// Register an adapter under its `channel_type`.  A second adapter of
    /// the same type replaces the first.
    pub fn register(&self, adapter: Arc<dyn ChannelAdapter>) {
        let key = adapter.channel_type().to_string();
        let mut adapters = self.adapters.write().expect("adapter table poisoned");
        if adapters.insert(key.clone(), adapter).is_some() {
            debug!(channel_type = %key, "replaced adapter; last registered wins");
        }
    }

    pub fn adapter_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .adapters
            .read()
            .expect("adapter table poisoned")
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Observe every outbound directly, bypassing adapters.
    pub fn set_on_reply(&self, cb: impl Fn(&Outbound) + Send + Sync + 'static) {
        *self.on_reply.write().expect("reply hook poisoned") = Some(Arc::new(cb));
    }

    /// Start every adapter, handing each an ingress sender for the bus.
    /// A failing adapter is logged and skipped.
    pub async fn start_all(&self, bus: &EventBus) {
        let adapters: Vec<Arc<dyn ChannelAdapter>> = self
            .adapters
            .read()
            .expect("adapter table poisoned")
            .values()
            .cloned()
            .collect();
        for adapter in adapters {
            let sender = InboundSender::new(bus.clone());
            if let Err(e) = adapter.start(sender).await {
                warn!(channel_type = adapter.channel_type(), error = %e, "adapter failed to start");
            }
        }
    }

    /// Stop every adapter.  Idempotent per the adapter contract.
    pub async fn stop_all(&self) {
        let adapters: Vec<Arc<dyn ChannelAdapter>> = self
            .adapters
            .read()
            .expect("adapter table poisoned")
            .values()
            .cloned()
            .collect();
        for adapter in adapters {
            if let Err(e) = adapter.stop().await {
                warn!(channel_type = adapter.channel_type(), error = %e, "adapter failed to stop");
            }
        }
    }

    /// Route one outbound to the adapter matching its channel type.
    ///
    /// Unknown type: logged, dropped, no error.  Delivery failure: caught
    /// and logged — the task is not re-driven.
    pub async fn deliver(&self, outbound: &Outbound) {
        if let Some(cb) = self.on_reply.read().expect("reply hook poisoned").clone() {
            cb(outbound);
        }

        let adapter = self
            .adapters
            .read()
            .expect("adapter table poisoned")
            .get(&outbound.channel.channel_type)
            .cloned();
        match adapter {
            Some(adapter) => {
                if let Err(e) = adapter.deliver(outbound).await {
                    warn!(
                        channel_type = %outbound.channel.channel_type,
                        channel_id = %outbound.channel.channel_id,
                        error = %e,
                        "outbound delivery failed"
                    );
                }
            }
            None => {
                warn!(
                    channel_type = %outbound.channel.channel_type,
                    "unknown channel type; dropping outbound"
                );
            }
        }
    }
}

impl Default for ChannelMux {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
