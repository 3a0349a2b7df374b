use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use quest_core::{ArgKind, ArgSchema, QuestError, Result, ToolCapability, ToolOutput};
use quest_runtime::ToolDescriptor;

use crate::{exec_error, truncate};

pub const NAME: &str = "add_dependencies";

pub fn descriptor(tool: Arc<AddDependencies>, timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Install Python packages so later run_code calls can import them.",
        timeout,
        ArgSchema::new().required("packages", ArgKind::StringList, "package names to install"),
        tool,
    )
}

pub struct AddDependencies {
    pip: String,
}

impl AddDependencies {
    pub fn new(pip: &str) -> Self {
        Self {
            pip: pip.to_string(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> QuestError {
    QuestError::InvalidArguments {
        tool: NAME.into(),
        reason: reason.into(),
    }
}

/// Package names handed to pip; anything that looks like an option is refused.
pub fn package_list(args: &Value) -> Result<Vec<String>> {
    let packages: Vec<String> = args["packages"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if packages.is_empty() {
        return Err(invalid("at least one package name is required"));
    }
    if let Some(flag) = packages.iter().find(|p| p.starts_with('-')) {
        return Err(invalid(format!("'{flag}' is not a package name")));
    }
    Ok(packages)
}

#[async_trait]
impl ToolCapability for AddDependencies {
    async fn invoke(&self, args: &Value) -> Result<ToolOutput> {
        let packages = package_list(args)?;
        info!(pip = %self.pip, ?packages, "installing packages");

        let output = tokio::process::Command::new(&self.pip)
            .arg("install")
            .arg("--quiet")
            .args(&packages)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| exec_error(NAME, format!("failed to start '{}': {e}", self.pip)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exec_error(
                NAME,
                format!("install exited with {}: {}", output.status, truncate(&stderr, 4_000)),
            ));
        }
        Ok(
            ToolOutput::ok(format!("installed: {}", packages.join(", ")))
                .with_data(json!({ "packages": packages })),
        )
    }
}
