use serde_json::Value;
use tracing::warn;

use quest_core::{QuestError, Result, ToolCall};

use crate::provider::{LlmResponse, RawToolCall};

/// The provider's instruction for the next step.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    /// Invoke a tool. `text` is any reasoning the provider emitted with the call.
    Invoke { text: String, call: ToolCall },
    /// No further action: the session is done.
    Finish { text: String },
}

impl ActionRequest {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionRequest::Finish { .. })
    }

    /// Parse a provider response into exactly one action.
    ///
    /// A response without tool calls is a terminal signal. When several calls are present
    /// only the first is honoured. A call whose name is not an identifier or whose
    /// arguments are not a JSON object is a `MalformedAction`.
    pub fn from_response(response: LlmResponse) -> Result<Self> {
        let LlmResponse {
            text, tool_calls, ..
        } = response;

        let mut calls = tool_calls.into_iter();
        let Some(first) = calls.next() else {
            return Ok(ActionRequest::Finish { text });
        };

        let dropped: Vec<String> = calls.map(|c| c.name).collect();
        if !dropped.is_empty() {
            warn!(
                kept = %first.name,
                dropped = ?dropped,
                "provider requested several tools in one step, keeping the first"
            );
        }

        let call = parse_call(first)?;
        Ok(ActionRequest::Invoke { text, call })
    }
}

fn parse_call(raw: RawToolCall) -> Result<ToolCall> {
    let name = raw.name.trim();
    if name.is_empty() {
        return Err(QuestError::MalformedAction("tool call without a name".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(QuestError::MalformedAction(format!(
            "tool name '{name}' is not a valid identifier"
        )));
    }

    let arguments = if raw.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str::<Value>(&raw.arguments).map_err(|e| {
            QuestError::MalformedAction(format!("arguments for '{name}' are not valid JSON: {e}"))
        })?
    };
    if !arguments.is_object() {
        return Err(QuestError::MalformedAction(format!(
            "arguments for '{name}' must be a JSON object"
        )));
    }

    let id = if raw.id.is_empty() {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    } else {
        raw.id
    };

    Ok(ToolCall {
        id,
        tool_name: name.to_string(),
        arguments,
    })
}
