//! Mock reasoning provider for deterministic testing.
//!
//! Returns pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::provider::*;
use quest_core::{QuestError, Result};

/// A mock provider that returns queued responses in order.
///
/// # Example
/// ```
/// use quest_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_tool_call("render_page", serde_json::json!({"url": "https://example.com"}))
///     .with_response("done");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Served whenever the queue is empty.
    fallback: Option<MockResponse>,
    latency: Option<Duration>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone, Default)]
pub struct MockResponse {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
    /// If set, the provider will return this error instead.
    pub error: Option<String>,
}

impl MockResponse {
    /// Create a text response (a terminal signal once parsed).
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// Create a single tool-call response.
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![RawToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                name: name.to_string(),
                arguments: args.to_string(),
            }],
            ..Default::default()
        }
    }

    /// Create a tool-call response with raw, unparsed argument text.
    pub fn raw_tool_call(name: &str, arguments: &str) -> Self {
        Self {
            tool_calls: vec![RawToolCall {
                id: "call_raw".into(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            ..Default::default()
        }
    }

    /// Create an error response.
    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            latency: None,
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.with_mock_response(MockResponse::text(text))
    }

    /// Queue a tool call response.
    pub fn with_tool_call(self, name: &str, args: serde_json::Value) -> Self {
        self.with_mock_response(MockResponse::tool_call(name, args))
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.with_mock_response(MockResponse::error(error))
    }

    /// Queue a fully custom response.
    pub fn with_mock_response(self, resp: MockResponse) -> Self {
        self.responses.lock().push_back(resp);
        self
    }

    /// Serve `resp` for every call once the queue is drained.
    pub fn always(mut self, resp: MockResponse) -> Self {
        self.fallback = Some(resp);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self) -> MockResponse {
        if let Some(resp) = self.responses.lock().pop_front() {
            return resp;
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| MockResponse::text("(mock: no more queued responses)"))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = mock.error {
            return Err(QuestError::LlmProvider(error));
        }

        let stop_reason = if mock.tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        };
        Ok(LlmResponse {
            text: mock.text,
            tool_calls: mock.tool_calls,
            stop_reason,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
