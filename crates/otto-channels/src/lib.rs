// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod adapter;
mod cli;
mod mux;
mod recording;
mod reply;

pub use adapter::{ChannelAdapter, InboundSender, Outbound};
pub use cli::{classify, CliAdapter, CliInput};
pub use mux::ChannelMux;
pub use recording::RecordingAdapter;
pub use reply::ReplyTool;

pub use otto_bus::{ChannelCoordinate, Inbound};
