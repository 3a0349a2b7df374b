use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use quest_core::{ArgKind, ArgSchema, Result, ToolCapability, ToolOutput};
use quest_runtime::ToolDescriptor;

use crate::{exec_error, truncate};

pub const NAME: &str = "run_code";
const MAX_STREAM_CHARS: usize = 50_000;

pub fn descriptor(tool: Arc<RunCode>, timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Run a Python snippet in a subprocess and return its stdout, stderr and exit code. \
         Files in the work and output directories are reachable by relative path.",
        timeout,
        ArgSchema::new().required("code", ArgKind::String, "Python source to execute"),
        tool,
    )
}

/// Runs snippets with the configured interpreter. The snippet lives in a temp file that is
/// removed once the child exits; dropping the future kills the child.
pub struct RunCode {
    interpreter: String,
}

impl RunCode {
    pub fn new(interpreter: &str) -> Self {
        Self {
            interpreter: interpreter.to_string(),
        }
    }
}

#[async_trait]
impl ToolCapability for RunCode {
    async fn invoke(&self, args: &Value) -> Result<ToolOutput> {
        let code = args["code"].as_str().unwrap_or_default();
        let script = tempfile::Builder::new()
            .prefix("quest-")
            .suffix(".py")
            .tempfile()?;
        tokio::fs::write(script.path(), code).await?;
        info!(interpreter = %self.interpreter, chars = code.len(), "running code");

        let child = tokio::process::Command::new(&self.interpreter)
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                exec_error(NAME, format!("failed to start '{}': {e}", self.interpreter))
            })?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = truncate(&String::from_utf8_lossy(&output.stdout), MAX_STREAM_CHARS);
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr), MAX_STREAM_CHARS);
        let report = json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        });
        let content = serde_json::to_string_pretty(&report)?;

        if output.status.success() {
            debug!(exit_code, "code ran");
            Ok(ToolOutput::ok(content).with_data(report))
        } else {
            warn!(exit_code, "code exited unsuccessfully");
            Ok(ToolOutput::failed(content).with_data(report))
        }
    }
}
