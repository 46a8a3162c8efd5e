// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Line-oriented terminal channel adapter.
//!
//! `/help`, `/exit`, and `/quit` are handled locally and never reach the
//! bus; every other line is injected as inbound text.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use otto_bus::{ChannelCoordinate, Inbound};

use crate::{ChannelAdapter, InboundSender, Outbound};

const HELP_TEXT: &str = "commands: /help  show this text, /exit or /quit  leave";

/// Classification of one terminal input line.
#[derive(Debug, PartialEq, Eq)]
pub enum CliInput<'a> {
    Help,
    Exit,
    Text(&'a str),
}

/// Classify a line.  Adapter-local commands never become inbound messages.
pub fn classify(line: &str) -> CliInput<'_> {
    match line.trim() {
        "/help" => CliInput::Help,
        "/exit" | "/quit" => CliInput::Exit,
        other => CliInput::Text(other),
    }
}

pub struct CliAdapter {
    channel_id: String,
    running: Arc<AtomicBool>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CliAdapter {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            running: Arc::new(AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        }
    }
}

impl Default for CliAdapter {
    fn default() -> Self {
        Self::new("main")
    }
}

#[async_trait]
impl ChannelAdapter for CliAdapter {
    fn channel_type(&self) -> &str {
        "cli"
    }

    async fn start(&self, sender: InboundSender) -> anyhow::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let running = Arc::clone(&self.running);
        let channel_id = self.channel_id.clone();
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while running.load(Ordering::SeqCst) {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => break,
                };
                match classify(&line) {
                    CliInput::Help => println!("{HELP_TEXT}"),
                    CliInput::Exit => {
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                    CliInput::Text("") => {}
                    CliInput::Text(text) => sender.send(Inbound {
                        text: text.to_string(),
                        channel: ChannelCoordinate::new("cli", channel_id.clone()),
                        metadata: None,
                    }),
                }
            }
            debug!("cli reader loop ended");
        });
        *self.reader_task.lock().expect("reader slot poisoned") = Some(handle);
        Ok(())
    }

    async fn deliver(&self, outbound: &Outbound) -> anyhow::Result<()> {
        println!("{}", outbound.text);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_task.lock().expect("reader slot poisoned").take() {
            handle.abort();
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
