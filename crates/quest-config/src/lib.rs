//! # quest-config
//!
//! Configuration for the quest engine. Reads `quest.toml`, then applies environment
//! overrides, then validates. CLI flags are layered on top by `quest-cli`.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::QuestConfig;
pub use schema::{
    ConfigWarning, LlmConfig, LoggingConfig, ServerConfig, SessionConfig, TaskConfig, ToolsConfig,
    WarningSeverity,
};
