// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChannelAdapter, InboundSender, Outbound};

/// Adapter double for tests: records every delivery, can inject inbounds
/// through the sender captured at start.
pub struct RecordingAdapter {
    channel_type: String,
    delivered: Mutex<Vec<Outbound>>,
    sender: Mutex<Option<InboundSender>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl RecordingAdapter {
    pub fn new(channel_type: impl Into<String>) -> Self {
        Self {
            channel_type: channel_type.into(),
            delivered: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn deliveries(&self) -> Vec<Outbound> {
        self.delivered.lock().expect("delivery log poisoned").clone()
    }

    /// The ingress sender captured at start, for injecting test messages.
    pub fn sender(&self) -> Option<InboundSender> {
        self.sender.lock().expect("sender slot poisoned").clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    fn channel_type(&self) -> &str {
        &self.channel_type
    }

    async fn start(&self, sender: InboundSender) -> anyhow::Result<()> {
        *self.sender.lock().expect("sender slot poisoned") = Some(sender);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver(&self, outbound: &Outbound) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .expect("delivery log poisoned")
            .push(outbound.clone());
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}
