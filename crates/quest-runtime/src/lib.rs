//! # quest-runtime
//!
//! The session runtime. A session alternates strictly between asking the reasoning
//! client for the next action and dispatching that action to a registered tool, until
//! the provider signals completion or a budget runs out.
//!
//! ```text
//!   Launcher ──spawn──▶ SessionController
//!                          │  loop:
//!                          │   1. deadline / step checks
//!                          │   2. ReasoningClient::next_action(log)
//!                          │   3. ToolDispatcher::dispatch(call)
//!                          │   4. append ToolResult turn
//!                          ▼
//!                   SessionTable (status + turns, for inspection)
//! ```

pub mod controller;
pub mod dispatch;
pub mod launcher;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod table;

pub use controller::{SessionController, SessionLimits, SessionOutcome};
pub use dispatch::ToolDispatcher;
pub use launcher::Launcher;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use session::Session;
pub use table::{DEFAULT_RETAINED_SESSIONS, SessionRecord, SessionSummary, SessionTable};
