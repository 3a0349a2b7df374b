//! # quest-llm
//!
//! The reasoning side of a session: a provider abstraction, the process-wide sliding-window
//! rate limiter shared by every session, and the [`ReasoningClient`] that turns a
//! conversation log into the next [`ActionRequest`].

pub mod action;
pub mod client;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod ratelimit;

pub use action::ActionRequest;
pub use client::{ClientConfig, MAX_RETRY_DELAY, ReasoningClient, StepContext};
pub use mock::MockProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, RawToolCall, StopReason, Usage};
pub use ratelimit::{Permit, RateLimiter};

use std::sync::Arc;

/// Build the configured reasoning provider.
pub fn build_provider(config: &quest_config::LlmConfig) -> quest_core::Result<Arc<dyn LlmProvider>> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider = openai::OpenAiProvider::new(api_key)
        .with_base_url(config.resolved_base_url(), config.provider.clone());
    Ok(Arc::new(provider))
}
