use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use quest_core::{ConversationLog, Event, EventBus, QuestError, Result, ToolSpec};

use crate::action::ActionRequest;
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};
use crate::ratelimit::RateLimiter;

/// Longest single backoff sleep, whatever `Retry-After` the provider sends.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Tunables for one [`ReasoningClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Budget for one attempt: permit acquisition plus the provider call.
    pub call_timeout: Duration,
    /// Retry ceiling for transient provider failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry).
    pub base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&quest_config::LlmConfig::default())
    }
}

impl From<&quest_config::LlmConfig> for ClientConfig {
    fn from(llm: &quest_config::LlmConfig) -> Self {
        Self {
            model: llm.model.clone(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            call_timeout: llm.call_timeout(),
            max_retries: llm.max_retries,
            base_delay: Duration::from_millis(llm.base_delay_ms),
        }
    }
}

/// Per-step information the controller hands to the client.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub session_id: Uuid,
    /// Backoff sleeps never run past this instant.
    pub deadline: Option<Instant>,
    /// Ephemeral note sent after the log. Not part of the conversation history.
    pub note: Option<String>,
}

impl StepContext {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            deadline: None,
            note: None,
        }
    }
}

/// Obtains the next [`ActionRequest`] from the provider, through the shared rate limiter.
#[derive(Clone)]
pub struct ReasoningClient {
    provider: Arc<dyn LlmProvider>,
    limiter: RateLimiter,
    config: ClientConfig,
    tools: Vec<ToolSpec>,
    events: Option<EventBus>,
}

impl ReasoningClient {
    pub fn new(provider: Arc<dyn LlmProvider>, limiter: RateLimiter, config: ClientConfig) -> Self {
        Self {
            provider,
            limiter,
            config,
            tools: Vec::new(),
            events: None,
        }
    }

    /// Advertise these tools on every request.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the provider what to do next given the whole log.
    ///
    /// Errors: `ProviderTimeout` when no permit arrives within the call timeout,
    /// `ProviderUnavailable` once transient failures exhaust their retries (or any
    /// non-transient provider failure), `MalformedAction` when the response cannot be
    /// turned into an action.
    pub async fn next_action(
        &self,
        log: &ConversationLog,
        ctx: &StepContext,
    ) -> Result<ActionRequest> {
        let request = self.build_request(log, ctx);
        let response = self.complete_with_retry(&request, ctx).await?;
        ActionRequest::from_response(response)
    }

    fn build_request(&self, log: &ConversationLog, ctx: &StepContext) -> LlmRequest {
        LlmRequest {
            model: self.config.model.clone(),
            turns: log.turns().to_vec(),
            tools: self.tools.clone(),
            system: None,
            context_note: ctx.note.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Retry a complete() call with exponential backoff on transient errors.
    async fn complete_with_retry(
        &self,
        request: &LlmRequest,
        ctx: &StepContext,
    ) -> Result<LlmResponse> {
        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        loop {
            // Every attempt is a provider call and spends a permit. The call only gets
            // what the permit wait left of the attempt budget.
            let attempt_started = Instant::now();
            let permit = self.limiter.acquire_timeout(self.config.call_timeout).await?;
            let remaining = self
                .config
                .call_timeout
                .saturating_sub(permit.granted_at.duration_since(attempt_started));

            let started = Instant::now();
            let outcome = match tokio::time::timeout(remaining, self.provider.complete(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(QuestError::LlmProvider(format!(
                    "provider call timed out after {}ms",
                    attempt_started.elapsed().as_millis()
                ))),
            };
            let duration_ms = started.elapsed().as_millis() as u64;
            self.publish(Event::ProviderCall {
                session_id: ctx.session_id,
                attempt: attempt + 1,
                success: outcome.is_ok(),
                duration_ms,
            });

            let err = match outcome {
                Ok(resp) => {
                    debug!(
                        session = %ctx.session_id,
                        provider = self.provider.name(),
                        attempt = attempt + 1,
                        duration_ms,
                        tool_calls = resp.tool_calls.len(),
                        "provider responded"
                    );
                    return Ok(resp);
                }
                Err(e) => e,
            };

            if matches!(err, QuestError::MalformedAction(_)) {
                return Err(err);
            }
            if !err.is_retryable() {
                return Err(QuestError::ProviderUnavailable(err.to_string()));
            }
            if attempt >= max_retries {
                return Err(QuestError::ProviderUnavailable(format!(
                    "{err} (gave up after {} attempts)",
                    attempt + 1
                )));
            }

            let delay = err
                .retry_after_secs()
                .map(Duration::from_secs)
                .unwrap_or_else(|| self.config.base_delay.saturating_mul(2u32.saturating_pow(attempt)))
                .min(MAX_RETRY_DELAY);
            if let Some(deadline) = ctx.deadline
                && Instant::now()
                    .checked_add(delay)
                    .is_none_or(|wake| wake >= deadline)
            {
                return Err(QuestError::ProviderUnavailable(format!(
                    "{err} (no time left for another attempt before the session deadline)"
                )));
            }

            warn!(
                session = %ctx.session_id,
                provider = self.provider.name(),
                attempt = attempt + 1,
                max = max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn publish(&self, event: Event) {
        if let Some(ref bus) = self.events {
            bus.publish(event);
        }
    }
}
