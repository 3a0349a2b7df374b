use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use quest_core::{QuestError, ToolCall, ToolError, ToolResult};

use crate::registry::ToolRegistry;

/// Runs registered tools under their timeouts and normalises every outcome into a
/// [`ToolResult`]. Never returns an error: failures are results with `success: false`.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        debug!(tool = %call.tool_name, call_id = %call.id, "dispatching tool");

        let Some(descriptor) = self.registry.get(&call.tool_name) else {
            warn!(tool = %call.tool_name, "unknown tool requested");
            return failure(
                call,
                QuestError::UnknownTool(call.tool_name.clone()),
                started,
            );
        };

        if let Err(reason) = descriptor.args.validate(&call.arguments) {
            warn!(tool = %call.tool_name, %reason, "rejected tool arguments");
            return failure(
                call,
                QuestError::InvalidArguments {
                    tool: call.tool_name.clone(),
                    reason,
                },
                started,
            );
        }

        // Expiry drops the capability's future, which is its cancellation signal.
        let outcome =
            tokio::time::timeout(descriptor.timeout, descriptor.capability.invoke(&call.arguments))
                .await;

        match outcome {
            Ok(Ok(output)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(
                    tool = %call.tool_name,
                    success = output.success,
                    elapsed_ms,
                    "tool finished"
                );
                ToolResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.tool_name.clone(),
                    success: output.success,
                    content: output.content,
                    data: output.data,
                    error: None,
                    elapsed_ms,
                }
            }
            Ok(Err(e)) => {
                warn!(tool = %call.tool_name, error = %e, "tool failed");
                let err = match e {
                    QuestError::ToolExecution { .. } | QuestError::InvalidArguments { .. } => e,
                    other => QuestError::ToolExecution {
                        tool: call.tool_name.clone(),
                        reason: other.to_string(),
                    },
                };
                failure(call, err, started)
            }
            Err(_) => {
                warn!(
                    tool = %call.tool_name,
                    timeout_ms = descriptor.timeout.as_millis() as u64,
                    "tool timed out"
                );
                failure(
                    call,
                    QuestError::ToolTimeout {
                        tool: call.tool_name.clone(),
                        timeout_ms: descriptor.timeout.as_millis() as u64,
                    },
                    started,
                )
            }
        }
    }
}

fn failure(call: &ToolCall, err: QuestError, started: Instant) -> ToolResult {
    let error = ToolError::from(&err);
    ToolResult {
        tool_call_id: call.id.clone(),
        tool_name: call.tool_name.clone(),
        success: false,
        content: error.message.clone(),
        data: None,
        error: Some(error),
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
