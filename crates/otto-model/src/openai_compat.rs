// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Client for OpenAI-compatible `/chat/completions` APIs.
//!
//! Most hosted and local providers speak this wire format; the registry
//! instantiates one of these for every provider whose resolved type is
//! `openai`, `codex`, or `copilot`, differing only in endpoint and auth.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    AssistantToolCall, GenerateOptions, GenerateResult, LlmError, MessageContent, ModelClient,
    Role, Usage,
};

/// How the API key is attached to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — standard for most providers.
    Bearer,
    /// `api-key: <key>` — Azure style.
    ApiKeyHeader,
    /// No authentication header — local servers.
    None,
}

pub struct OpenAiCompatClient {
    provider: String,
    model: String,
    api_key: Option<String>,
    chat_url: String,
    auth_style: AuthStyle,
    timeout: Duration,
    client: reqwest::Client,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key,
            chat_url: format!("{base}/chat/completions"),
            auth_style: AuthStyle::Bearer,
            timeout,
            client: reqwest::Client::new(),
            extra_headers: Vec::new(),
        }
    }

    /// Endpoint whose chat path cannot be derived by appending
    /// `/chat/completions` to a base (e.g. a gateway with a custom path).
    pub fn with_full_chat_url(
        provider: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        chat_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key,
            chat_url: chat_url.into(),
            auth_style: AuthStyle::Bearer,
            timeout,
            client: reqwest::Client::new(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_auth_style(mut self, style: AuthStyle) -> Self {
        self.auth_style = style;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn build_body(&self, opts: &GenerateOptions) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(opts.messages.len() + 1);
        if let Some(system) = &opts.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for m in &opts.messages {
            messages.push(wire_message(&m.role, &m.content));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !opts.tools.is_empty() {
            body["tools"] = Value::Array(
                opts.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
        }
        if let Some(mt) = opts.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(temp) = opts.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn parse_response(&self, body: &Value) -> Result<GenerateResult, LlmError> {
        let message = &body["choices"][0]["message"];
        if message.is_null() {
            return Err(LlmError::Api {
                provider: self.provider.clone(),
                status: 200,
                message: "response carried no choices".into(),
            });
        }
        let text = message["content"].as_str().unwrap_or_default().to_string();
        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let arguments = call["function"]["arguments"]
                    .as_str()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| json!({}));
                tool_calls.push(AssistantToolCall {
                    id: call["id"].as_str().unwrap_or_default().to_string(),
                    name: call["function"]["name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    arguments,
                });
            }
        }
        let usage = Usage {
            input_tokens: body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
        Ok(GenerateResult {
            text,
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, opts: GenerateOptions) -> Result<GenerateResult, LlmError> {
        let body = self.build_body(&opts);
        debug!(provider = %self.provider, model = %self.model, "chat completion request");

        let mut req = self
            .client
            .post(&self.chat_url)
            .timeout(self.timeout)
            .json(&body);
        match (&self.auth_style, &self.api_key) {
            (AuthStyle::Bearer, Some(key)) => req = req.bearer_auth(key),
            (AuthStyle::ApiKeyHeader, Some(key)) => req = req.header("api-key", key),
            _ => {}
        }
        for (name, value) in &self.extra_headers {
            req = req.header(name, value);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                LlmError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited {
                provider: self.provider.clone(),
                message: text,
            });
        }
        if !status.is_success() {
            return Err(LlmError::Api {
                provider: self.provider.clone(),
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Transport(e.to_string()))?;
        self.parse_response(&parsed)
    }
}

fn wire_message(role: &Role, content: &MessageContent) -> Value {
    match content {
        MessageContent::Text(text) => json!({"role": role.as_str(), "content": text}),
        MessageContent::ToolCall {
            tool_call_id,
            function,
        } => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "id": tool_call_id,
                "type": "function",
                "function": {"name": function.name, "arguments": function.arguments},
            }],
        }),
        MessageContent::ToolResult {
            tool_call_id,
            content,
        } => json!({
            "role": "tool",
            "content": content,
            "tool_call_id": tool_call_id,
        }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{Message, ToolSchema};

    fn client() -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            "openai",
            "gpt-4o",
            Some("sk-test".into()),
            "https://api.openai.com/v1",
            Duration::from_secs(30),
        )
    }

    #[test]
    fn chat_url_is_derived_from_base() {
        let c = client();
        assert_eq!(c.chat_url, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn body_includes_system_then_conversation() {
        let c = client();
        let opts = GenerateOptions {
            system: Some("be brief".into()),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let body = c.build_body(&opts);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn body_omits_tools_when_empty() {
        let c = client();
        let body = c.build_body(&GenerateOptions::default());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn body_wraps_tools_in_function_envelope() {
        let c = client();
        let opts = GenerateOptions {
            tools: vec![ToolSchema {
                name: "search".into(),
                description: "find things".into(),
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        };
        let body = c.build_body(&opts);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search");
    }

    #[test]
    fn tool_call_message_becomes_tool_calls_array() {
        let v = wire_message(
            &Role::Assistant,
            &MessageContent::ToolCall {
                tool_call_id: "call-1".into(),
                function: crate::FunctionCall {
                    name: "search".into(),
                    arguments: r#"{"q":"x"}"#.into(),
                },
            },
        );
        assert_eq!(v["tool_calls"][0]["id"], "call-1");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "search");
        assert!(v["content"].is_null());
    }

    #[test]
    fn tool_result_message_carries_tool_call_id() {
        let v = wire_message(
            &Role::Tool,
            &MessageContent::ToolResult {
                tool_call_id: "call-1".into(),
                content: "42".into(),
            },
        );
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call-1");
    }

    #[test]
    fn response_parse_extracts_text_and_usage() {
        let c = client();
        let body = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 11, "completion_tokens": 7},
        });
        let r = c.parse_response(&body).unwrap();
        assert_eq!(r.text, "hello");
        assert!(r.tool_calls.is_empty());
        assert_eq!(r.usage.input_tokens, 11);
        assert_eq!(r.usage.output_tokens, 7);
    }

    #[test]
    fn response_parse_extracts_tool_calls() {
        let c = client();
        let body = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call-9",
                    "function": {"name": "reply", "arguments": "{\"text\":\"hi\"}"},
                }],
            }}],
        });
        let r = c.parse_response(&body).unwrap();
        assert_eq!(r.text, "");
        assert_eq!(r.tool_calls.len(), 1);
        assert_eq!(r.tool_calls[0].name, "reply");
        assert_eq!(r.tool_calls[0].arguments["text"], "hi");
    }

    #[test]
    fn response_parse_substitutes_empty_object_for_bad_arguments() {
        let c = client();
        let body = json!({
            "choices": [{"message": {
                "tool_calls": [{
                    "id": "call-9",
                    "function": {"name": "reply", "arguments": "{not json"},
                }],
            }}],
        });
        let r = c.parse_response(&body).unwrap();
        assert_eq!(r.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn response_without_choices_is_an_api_error() {
        let c = client();
        assert!(matches!(
            c.parse_response(&json!({})),
            Err(LlmError::Api { .. })
        ));
    }
}
