use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use quest_core::{QuestError, Result, Role, ToolResult, Turn, TurnContent};

use crate::provider::*;

/// Chat-completions provider. Works with OpenAI and any compatible endpoint, including
/// Gemini's OpenAI-compatible surface.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
        }
    }

    /// Use a custom base URL (Gemini, vLLM, a local proxy, etc.)
    pub fn with_base_url(mut self, url: String, name: String) -> Self {
        self.base_url = url;
        self.provider_name = name;
        self
    }

    /// Build the chat-completions request body.
    pub fn build_body(request: &LlmRequest) -> Value {
        let mut messages = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for turn in &request.turns {
            messages.push(turn_to_message(turn));
        }
        if let Some(ref note) = request.context_note {
            messages.push(json!({ "role": "user", "content": note }));
        }

        let mut body = json!({
            "model": &request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
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
                .collect();
            body["tools"] = json!(tools);
        }
        body
    }

    /// Parse a chat-completions response body.
    pub fn parse_body(data: &Value) -> Result<LlmResponse> {
        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| QuestError::MalformedAction("response has no choices".into()))?;
        let text = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let tool_calls: Vec<RawToolCall> = choice["message"]["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|c| RawToolCall {
                        id: c["id"].as_str().unwrap_or_default().to_string(),
                        name: c["function"]["name"].as_str().unwrap_or_default().to_string(),
                        arguments: match &c["function"]["arguments"] {
                            Value::String(s) => s.clone(),
                            Value::Null => String::new(),
                            other => other.to_string(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice["finish_reason"].as_str().unwrap_or("");
        let usage = &data["usage"];
        let has_tool_calls = !tool_calls.is_empty();

        Ok(LlmResponse {
            text,
            tool_calls,
            stop_reason: match finish_reason {
                "length" => StopReason::MaxTokens,
                "content_filter" => StopReason::ContentFilter,
                _ if has_tool_calls => StopReason::ToolUse,
                _ => StopReason::EndTurn,
            },
            usage: Usage {
                input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
            },
        })
    }
}

fn turn_to_message(turn: &Turn) -> Value {
    match (&turn.role, &turn.content) {
        (_, TurnContent::ToolCall { text, call }) => {
            let content = if text.is_empty() {
                Value::Null
            } else {
                json!(text)
            };
            json!({
                "role": "assistant",
                "content": content,
                "tool_calls": [{
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.tool_name,
                        "arguments": call.arguments.to_string(),
                    }
                }],
            })
        }
        (_, TurnContent::ToolResult { result }) => json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": tool_result_text(result),
        }),
        (Role::System, TurnContent::Text { text }) => json!({ "role": "system", "content": text }),
        (Role::Assistant, TurnContent::Text { text }) => {
            json!({ "role": "assistant", "content": text })
        }
        (_, TurnContent::Text { text }) => json!({ "role": "user", "content": text }),
    }
}

/// What the provider sees for a tool result. Failures are spelled out so it can adapt.
fn tool_result_text(result: &ToolResult) -> String {
    match &result.error {
        Some(err) => {
            let kind = serde_json::to_value(err.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("ERROR [{kind}]: {}", err.message)
        }
        None => match &result.data {
            Some(data) if result.content.is_empty() => data.to_string(),
            _ => result.content.clone(),
        },
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = Self::build_body(request);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| QuestError::LlmProvider(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429
            && let Some(secs) = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        {
            return Err(QuestError::RateLimited {
                retry_after_secs: secs,
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(QuestError::LlmProvider(format!("HTTP {}: {text}", status.as_u16())));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| QuestError::LlmProvider(e.to_string()))?;
        Self::parse_body(&data)
    }

    async fn health_check(&self) -> Result<()> {
        info!(provider = self.provider_name, "checking API health");
        if self.api_key.is_empty() {
            return Err(QuestError::LlmProvider(format!(
                "{} API key not set",
                self.provider_name
            )));
        }
        Ok(())
    }
}
