use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCall, ToolResult};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool_result",
        };
        f.write_str(s)
    }
}

/// Payload of a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    /// An assistant turn that requested a tool. `text` holds any reasoning the
    /// provider emitted alongside the call.
    ToolCall {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        text: String,
        call: ToolCall,
    },
    ToolResult {
        result: ToolResult,
    },
}

/// One immutable entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub seq: u64,
    pub session_id: Uuid,
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Text carried by the turn, if any. Tool results render their content.
    pub fn text(&self) -> &str {
        match &self.content {
            TurnContent::Text { text } => text,
            TurnContent::ToolCall { text, .. } => text,
            TurnContent::ToolResult { result } => &result.content,
        }
    }

    pub fn tool_call(&self) -> Option<&ToolCall> {
        match &self.content {
            TurnContent::ToolCall { call, .. } => Some(call),
            _ => None,
        }
    }

    pub fn tool_result(&self) -> Option<&ToolResult> {
        match &self.content {
            TurnContent::ToolResult { result } => Some(result),
            _ => None,
        }
    }

    /// Short single-line description used in events and logs.
    pub fn summary(&self, max_chars: usize) -> String {
        let raw = match &self.content {
            TurnContent::Text { text } => text.clone(),
            TurnContent::ToolCall { call, .. } => format!("call {}({})", call.tool_name, call.arguments),
            TurnContent::ToolResult { result } => match &result.error {
                Some(err) => format!("{} failed: {}", result.tool_name, err.message),
                None => format!("{} ok: {}", result.tool_name, result.content),
            },
        };
        let flat = raw.replace('\n', " ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let mut s: String = flat.chars().take(max_chars).collect();
            s.push('…');
            s
        }
    }
}

/// Append-only, ordered record of the turns of one session.
///
/// Turns are never mutated or removed once written; the only way in is
/// [`ConversationLog::append`], which assigns the next sequence index.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    session_id: Uuid,
    turns: Vec<Turn>,
    next_seq: u64,
}

impl ConversationLog {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            turns: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append a turn and return a reference to it.
    pub fn append(&mut self, role: Role, content: TurnContent) -> &Turn {
        let turn = Turn {
            seq: self.next_seq,
            session_id: self.session_id,
            role,
            content,
            timestamp: Utc::now(),
        };
        self.next_seq += 1;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn append_text(&mut self, role: Role, text: impl Into<String>) -> &Turn {
        self.append(role, TurnContent::Text { text: text.into() })
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Consume the log, yielding its turns.
    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}
