use async_trait::async_trait;
use quest_core::{Result, ToolSpec, Turn};
use serde::{Deserialize, Serialize};

/// A request to a reasoning provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Provider-specific model name, e.g. "gemini-2.0-flash".
    pub model: String,
    /// The full conversation log, in order.
    pub turns: Vec<Turn>,
    /// Tools the provider may request.
    pub tools: Vec<ToolSpec>,
    /// System prompt for providers that take it out of band. The log's own System turn is
    /// always sent, so this is normally `None`.
    pub system: Option<String>,
    /// Ephemeral note sent after the log as a trailing user message. Never logged.
    pub context_note: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A tool call exactly as the provider produced it. Arguments are still raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// A complete response from a provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    ContentFilter,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait implemented by each reasoning provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable name, e.g. "gemini", "openai".
    fn name(&self) -> &str;

    /// Send one request. Transport failures come back as `QuestError::LlmProvider` or
    /// `QuestError::RateLimited`; the client decides whether to retry.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Check if this provider is configured and reachable.
    async fn health_check(&self) -> Result<()>;
}
