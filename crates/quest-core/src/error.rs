use thiserror::Error;

/// Unified error type for the quest engine.
#[derive(Error, Debug)]
pub enum QuestError {
    // ── Reasoning provider errors ──────────────────────────────
    #[error("reasoning provider timed out after {waited_ms}ms")]
    ProviderTimeout { waited_ms: u64 },

    #[error("reasoning provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("malformed action from provider: {0}")]
    MalformedAction(String),

    /// Raw provider failure, classified by [`QuestError::is_retryable`] before it is
    /// surfaced as `ProviderUnavailable`.
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("llm rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Tool errors ────────────────────────────────────────────
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool {tool} timed out after {timeout_ms}ms")]
    ToolTimeout { tool: String, timeout_ms: u64 },

    #[error("tool execution failed: {tool}: {reason}")]
    ToolExecution { tool: String, reason: String },

    // ── Session errors ─────────────────────────────────────────
    #[error("session deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("session step limit of {limit} reached")]
    StepLimitExceeded { limit: u32 },

    // ── Boundary errors ────────────────────────────────────────
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl QuestError {
    /// Whether a provider failure is transient and worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            QuestError::RateLimited { .. } => true,
            QuestError::LlmProvider(msg) | QuestError::Http(msg) => {
                msg.starts_with("HTTP 429")
                    || msg.starts_with("HTTP 500")
                    || msg.starts_with("HTTP 502")
                    || msg.starts_with("HTTP 503")
                    || msg.starts_with("HTTP 529")
                    || msg.contains("timed out")
                    || msg.contains("connection reset")
                    || msg.contains("connection closed")
                    || msg.contains("error sending request")
                    || msg.contains("overloaded")
            }
            _ => false,
        }
    }

    /// Retry-after hint carried by a rate-limit error, in seconds.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            QuestError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QuestError>;
