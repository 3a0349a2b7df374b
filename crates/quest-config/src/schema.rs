use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration, maps to `quest.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub session: SessionConfig,
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub task: TaskConfig,
    pub logging: LoggingConfig,
}

// ── Session ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wall-clock budget per session, measured from session start.
    pub deadline_secs: u64,
    /// Hard cap on loop iterations per session.
    pub step_limit: u32,
    /// Re-asks with the same log after a malformed provider action, per step.
    pub malformed_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 180,
            step_limit: 200,
            malformed_retries: 2,
        }
    }
}

impl SessionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

// ── Reasoning provider ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider flavour: "gemini" or "openai". Both speak the chat-completions protocol.
    pub provider: String,
    pub model: String,
    /// Override for the provider's base URL.
    pub base_url: Option<String>,
    /// API key. Can also be set via GOOGLE_API_KEY or OPENAI_API_KEY.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Maximum provider calls within any rolling window.
    pub requests_per_window: u32,
    pub window_secs: u64,
    /// Bound on waiting for a permit and on a single provider call.
    pub call_timeout_secs: u64,
    /// Retry ceiling for transient provider failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry).
    pub base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-2.0-flash".into(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            max_tokens: 8192,
            requests_per_window: 9,
            window_secs: 60,
            call_timeout_secs: 60,
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Base URL for the configured provider flavour.
    pub fn resolved_base_url(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1".into(),
            _ => "https://generativelanguage.googleapis.com/v1beta/openai".into(),
        }
    }
}

// ── Tools ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Where downloaded files land.
    pub work_dir: PathBuf,
    /// Where generated artifacts (charts, exports) are written.
    pub output_dir: PathBuf,
    /// Interpreter used by `run_code`.
    pub python: String,
    /// Installer used by `add_dependencies`.
    pub pip: String,
    /// Headless browser binary used by `render_page`.
    pub browser: String,
    pub render_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub run_code_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    pub install_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("LLMFiles"),
            output_dir: PathBuf::from("outputs"),
            python: "python3".into(),
            pip: "pip".into(),
            browser: "chromium".into(),
            render_timeout_secs: 45,
            download_timeout_secs: 60,
            run_code_timeout_secs: 60,
            submit_timeout_secs: 30,
            install_timeout_secs: 120,
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Finished sessions kept for inspection; the oldest are dropped first.
    pub max_retained_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:7860".into(),
            cors: false,
            max_retained_sessions: 100,
        }
    }
}

// ── Task credentials ───────────────────────────────────────────

/// Credentials expected on task-start requests and used for submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Expected email. A mismatch is logged, not rejected.
    pub email: Option<String>,
    /// Shared secret every task-start request must present.
    pub secret: Option<String>,
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl QuestConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Session budgets ───
        if self.session.deadline_secs == 0 {
            warnings.push(ConfigWarning {
                field: "session.deadline_secs".into(),
                message: "deadline is 0; no step could ever start".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 180".into()),
            });
        }
        if self.session.step_limit == 0 {
            warnings.push(ConfigWarning {
                field: "session.step_limit".into(),
                message: "step limit is 0; no step could ever start".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 200".into()),
            });
        }

        // ── Rate window ───
        if self.llm.requests_per_window == 0 {
            warnings.push(ConfigWarning {
                field: "llm.requests_per_window".into(),
                message: "no provider calls would ever be permitted".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to the provider quota, e.g. 9".into()),
            });
        }
        if self.llm.window_secs == 0 {
            warnings.push(ConfigWarning {
                field: "llm.window_secs".into(),
                message: "rate window is 0 seconds".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 60".into()),
            });
        }

        // ── Temperature ───
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "llm.temperature".into(),
                message: format!("temperature {} is out of range", self.llm.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        // ── Provider ───
        let valid_providers = ["gemini", "openai"];
        if !valid_providers.contains(&self.llm.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "llm.provider".into(),
                message: format!("unknown provider '{}'", self.llm.provider),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_providers.join(", "))),
            });
        }
        if self.llm.api_key.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning {
                field: "llm.api_key".into(),
                message: "no API key; sessions will fail at the first provider call".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set llm.api_key or export GOOGLE_API_KEY".into()),
            });
        }

        // ── Server ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '0.0.0.0:7860'".into()),
            });
        }
        if self.task.secret.as_deref().is_none_or(str::is_empty) {
            warnings.push(ConfigWarning {
                field: "task.secret".into(),
                message: "no task secret; every task-start request will be refused".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set task.secret or export SECRET".into()),
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
