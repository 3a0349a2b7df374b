use std::path::{Path, PathBuf};
use tracing::{info, warn};

use quest_core::QuestError;

use crate::schema::QuestConfig;

/// Loads the quest configuration once at startup.
#[derive(Debug)]
pub struct ConfigLoader {
    config: QuestConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > QUEST_CONFIG env > ./quest.toml > ~/.quest/quest.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("QUEST_CONFIG") {
            return PathBuf::from(p);
        }
        let local = PathBuf::from("quest.toml");
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quest")
            .join("quest.toml")
    }

    /// Load the config from disk, falling back to defaults, with process env overrides.
    pub fn load(path: Option<&Path>) -> quest_core::Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] but reads overrides through `env`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> quest_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            QuestConfig::default()
        };

        let config = Self::apply_env_overrides(config, env);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(reason) => {
                return Err(QuestError::ConfigValidation {
                    field: config_path.display().to_string(),
                    reason,
                });
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, path: &Path) -> quest_core::Result<QuestConfig> {
        toml::from_str::<QuestConfig>(raw).map_err(|e| {
            QuestError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Snapshot of the effective config.
    pub fn get(&self) -> QuestConfig {
        self.config.clone()
    }

    pub fn config(&self) -> &QuestConfig {
        &self.config
    }

    /// Path the config was resolved from (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env overrides. Secrets from the environment only fill values the file leaves unset.
    pub fn apply_env_overrides(
        mut config: QuestConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> QuestConfig {
        if let Some(v) = env("QUEST_MODEL") {
            config.llm.model = v;
        }
        if let Some(v) = env("QUEST_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = env("PORT") {
            if v.parse::<u16>().is_ok() {
                config.server.listen = format!("0.0.0.0:{v}");
            } else {
                warn!(port = %v, "ignoring non-numeric PORT");
            }
        }
        // Explicit listen address wins over PORT.
        if let Some(v) = env("QUEST_LISTEN") {
            config.server.listen = v;
        }

        if config.task.secret.is_none() {
            config.task.secret = env("SECRET");
        }
        if config.task.email.is_none() {
            config.task.email = env("EMAIL");
        }
        if config.llm.api_key.is_none() {
            let var = match config.llm.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "GOOGLE_API_KEY",
            };
            config.llm.api_key = env(var);
        }
        config
    }
}
