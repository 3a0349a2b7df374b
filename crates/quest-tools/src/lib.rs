//! # quest-tools
//!
//! The built-in capabilities a session can call. Each tool declares a strict argument
//! schema and a timeout from `[tools]` config; cancellation is by drop, so every child
//! process is spawned with `kill_on_drop`.

pub mod deps;
pub mod download;
pub mod render;
pub mod run_code;
pub mod submit;

use std::sync::Arc;
use std::time::Duration;

use quest_config::{TaskConfig, ToolsConfig};
use quest_core::QuestError;
use quest_runtime::ToolRegistry;

pub use deps::AddDependencies;
pub use download::DownloadFile;
pub use render::RenderPage;
pub use run_code::RunCode;
pub use submit::PostRequest;

/// Register every built-in tool with timeouts from `tools`.
pub fn register_builtin(registry: &mut ToolRegistry, tools: &ToolsConfig, task: &TaskConfig) {
    let client = reqwest::Client::new();
    registry.register(render::descriptor(
        Arc::new(RenderPage::new(&tools.browser).with_client(client.clone())),
        Duration::from_secs(tools.render_timeout_secs),
    ));
    registry.register(download::descriptor(
        Arc::new(DownloadFile::new(&tools.work_dir).with_client(client.clone())),
        Duration::from_secs(tools.download_timeout_secs),
    ));
    registry.register(run_code::descriptor(
        Arc::new(RunCode::new(&tools.python)),
        Duration::from_secs(tools.run_code_timeout_secs),
    ));
    registry.register(submit::descriptor(
        Arc::new(
            PostRequest::new(task.email.clone(), task.secret.clone()).with_client(client),
        ),
        Duration::from_secs(tools.submit_timeout_secs),
    ));
    registry.register(deps::descriptor(
        Arc::new(AddDependencies::new(&tools.pip)),
        Duration::from_secs(tools.install_timeout_secs),
    ));
}

/// Create the work and output directories the tools read and write.
pub async fn prepare_dirs(tools: &ToolsConfig) -> quest_core::Result<()> {
    tokio::fs::create_dir_all(&tools.work_dir).await?;
    tokio::fs::create_dir_all(&tools.output_dir).await?;
    Ok(())
}

pub(crate) fn exec_error(tool: &str, reason: impl Into<String>) -> QuestError {
    QuestError::ToolExecution {
        tool: tool.into(),
        reason: reason.into(),
    }
}

/// Keep at most `max` characters, marking the cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("\n…[truncated]");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate("abcdefghij", 4);
        assert!(cut.starts_with("abcd"));
        assert!(cut.ends_with("[truncated]"));
    }
}
