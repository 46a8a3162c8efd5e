// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use otto_bus::{ChannelCoordinate, Event, EventBus, EventPayload, EventType, Inbound};

/// A message leaving the system toward a channel.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub text: String,
    pub channel: ChannelCoordinate,
}

/// Ingress handle given to an adapter at start.  `send` wraps the inbound
/// as a `MESSAGE_RECEIVED` event and places it on the bus; it never blocks.
#[derive(Clone)]
pub struct InboundSender {
    bus: EventBus,
}

impl InboundSender {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn send(&self, inbound: Inbound) {
        let source = inbound.channel.channel_type.clone();
        self.bus.emit(
            Event::new(EventType::MessageReceived)
                .with_source(source)
                .with_payload(EventPayload::Inbound(inbound)),
        );
    }
}

/// One concrete channel integration (terminal, chat bot, project worker).
///
/// `channel_type` is the stable routing key: outbound replies are matched
/// against it, never against adapter identity.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel_type(&self) -> &str;

    /// Begin receiving.  The adapter keeps the sender and injects every
    /// incoming message with it.
    async fn start(&self, sender: InboundSender) -> anyhow::Result<()>;

    /// Ship one outbound message.
    async fn deliver(&self, outbound: &Outbound) -> anyhow::Result<()>;

    /// Stop receiving.  Idempotent.
    async fn stop(&self) -> anyhow::Result<()>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use otto_bus::TaskId;

    #[tokio::test]
    async fn send_wraps_inbound_as_message_received() {
        let bus = EventBus::with_history(8);
        bus.start();
        let sender = InboundSender::new(bus.clone());
        sender.send(Inbound {
            text: "hi there".into(),
            channel: ChannelCoordinate::new("telegram", "tg-1"),
            metadata: None,
        });
        bus.drain().await;

        let h = bus.history();
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].event_type(), EventType::MessageReceived);
        assert_eq!(h[0].source(), "telegram");
        assert_eq!(h[0].task_id(), None::<&TaskId>);
        match h[0].payload() {
            EventPayload::Inbound(inbound) => {
                assert_eq!(inbound.text, "hi there");
                assert_eq!(inbound.channel.channel_id, "tg-1");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        bus.stop().await;
    }
}
