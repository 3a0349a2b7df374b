use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::log::Role;
use crate::types::SessionStatus;

/// Events flowing out of the engine for external logging and metrics collectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    // ── Session lifecycle ──────────────────────────────────────
    SessionStarted {
        session_id: Uuid,
        target: String,
    },
    SessionFinished {
        session_id: Uuid,
        status: SessionStatus,
        steps: u32,
        elapsed_ms: u64,
    },

    // ── Conversation ───────────────────────────────────────────
    /// Emitted once for every turn appended to a session's log.
    TurnAppended {
        session_id: Uuid,
        seq: u64,
        role: Role,
        summary: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    // ── Reasoning provider ─────────────────────────────────────
    ProviderCall {
        session_id: Uuid,
        attempt: u32,
        success: bool,
        duration_ms: u64,
    },
}

/// A broadcast-based event bus for the observability stream.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
