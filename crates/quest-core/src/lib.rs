//! # quest-core
//!
//! Core types, traits, and primitives for the quest session engine.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! the error taxonomy, conversation turns and the append-only log, tool descriptors and
//! results, and the event bus that carries the observability stream.

pub mod error;
pub mod event;
pub mod log;
pub mod tool;
pub mod types;

pub use error::{QuestError, Result};
pub use event::{Event, EventBus};
pub use log::{ConversationLog, Role, Turn, TurnContent};
pub use tool::{
    ArgKind, ArgSchema, ToolCall, ToolCapability, ToolError, ToolErrorKind, ToolOutput, ToolResult,
    ToolSpec,
};
pub use types::*;
