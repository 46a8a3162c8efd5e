// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Client for the Anthropic `/v1/messages` API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    AssistantToolCall, GenerateOptions, GenerateResult, LlmError, MessageContent, ModelClient,
    Role, Usage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    provider: String,
    model: String,
    api_key: Option<String>,
    messages_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicClient {
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
            messages_url: format!("{base}/v1/messages"),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, opts: &GenerateOptions) -> Value {
        let messages: Vec<Value> = opts
            .messages
            .iter()
            .map(|m| wire_message(&m.role, &m.content))
            .collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages,
        });
        if let Some(system) = &opts.system {
            body["system"] = json!(system);
        }
        if !opts.tools.is_empty() {
            body["tools"] = Value::Array(
                opts.tools
                    .iter()
                    .map(|t| {
                        json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect(),
            );
        }
        if let Some(temp) = opts.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    fn parse_response(&self, body: &Value) -> Result<GenerateResult, LlmError> {
        let content = body["content"].as_array().ok_or_else(|| LlmError::Api {
            provider: self.provider.clone(),
            status: 200,
            message: "response carried no content blocks".into(),
        })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in content {
            match block["type"].as_str() {
                Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") => tool_calls.push(AssistantToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                }),
                _ => {}
            }
        }
        let usage = Usage {
            input_tokens: body["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: body["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };
        Ok(GenerateResult {
            text,
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, opts: GenerateOptions) -> Result<GenerateResult, LlmError> {
        let body = self.build_body(&opts);
        debug!(provider = %self.provider, model = %self.model, "messages request");

        let mut req = self
            .client
            .post(&self.messages_url)
            .timeout(self.timeout)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
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
        MessageContent::Text(text) => {
            // Anthropic has no system role inside messages; the registry
            // routes the system prompt through the top-level field.
            let role = match role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            json!({"role": role, "content": text})
        }
        MessageContent::ToolCall {
            tool_call_id,
            function,
        } => {
            let input: Value =
                serde_json::from_str(&function.arguments).unwrap_or_else(|_| json!({}));
            json!({
                "role": "assistant",
                "content": [{
                    "type": "tool_use",
                    "id": tool_call_id,
                    "name": function.name,
                    "input": input,
                }],
            })
        }
        MessageContent::ToolResult {
            tool_call_id,
            content,
        } => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_call_id,
                "content": content,
            }],
        }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Message;

    fn client() -> AnthropicClient {
        AnthropicClient::new(
            "anthropic",
            "claude-sonnet-4-5",
            Some("key".into()),
            "https://api.anthropic.com",
            Duration::from_secs(30),
        )
    }

    #[test]
    fn messages_url_is_derived() {
        assert_eq!(client().messages_url, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn system_prompt_is_top_level() {
        let body = client().build_body(&GenerateOptions {
            system: Some("rules".into()),
            messages: vec![Message::user("hi")],
            ..Default::default()
        });
        assert_eq!(body["system"], "rules");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn tools_use_input_schema_key() {
        let body = client().build_body(&GenerateOptions {
            tools: vec![crate::ToolSchema {
                name: "reply".into(),
                description: "send".into(),
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        });
        assert_eq!(body["tools"][0]["name"], "reply");
        assert!(body["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn tool_result_maps_to_user_block() {
        let v = wire_message(
            &Role::Tool,
            &MessageContent::ToolResult {
                tool_call_id: "tu-1".into(),
                content: "out".into(),
            },
        );
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"][0]["type"], "tool_result");
        assert_eq!(v["content"][0]["tool_use_id"], "tu-1");
    }

    #[test]
    fn response_parse_collects_text_and_tool_use() {
        let body = json!({
            "content": [
                {"type": "text", "text": "thinking..."},
                {"type": "tool_use", "id": "tu-1", "name": "reply", "input": {"text": "hi"}},
            ],
            "usage": {"input_tokens": 3, "output_tokens": 5},
        });
        let r = client().parse_response(&body).unwrap();
        assert_eq!(r.text, "thinking...");
        assert_eq!(r.tool_calls[0].name, "reply");
        assert_eq!(r.usage.output_tokens, 5);
    }

    #[test]
    fn response_without_content_is_api_error() {
        assert!(client().parse_response(&json!({})).is_err());
    }
}
