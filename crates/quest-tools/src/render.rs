use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use quest_core::{ArgKind, ArgSchema, Result, ToolCapability, ToolOutput};
use quest_runtime::ToolDescriptor;

use crate::{exec_error, truncate};

pub const NAME: &str = "render_page";
const MAX_HTML_CHARS: usize = 200_000;

pub fn descriptor(tool: Arc<RenderPage>, timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Fetch a page after its JavaScript has run and return the rendered HTML.",
        timeout,
        ArgSchema::new().required("url", ArgKind::String, "absolute URL of the page"),
        tool,
    )
}

/// Renders a page through a headless browser's `--dump-dom`, or a plain GET when no
/// browser is installed.
pub struct RenderPage {
    browser: String,
    client: reqwest::Client,
}

impl RenderPage {
    pub fn new(browser: &str) -> Self {
        Self {
            browser: browser.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// `Ok(None)` when the browser binary is missing.
    async fn dump_dom(&self, url: &str) -> Result<Option<String>> {
        let spawned = tokio::process::Command::new(&self.browser)
            .args(["--headless", "--disable-gpu", "--no-sandbox", "--dump-dom", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(exec_error(NAME, format!("failed to start browser: {e}"))),
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exec_error(
                NAME,
                format!("browser exited with {}: {}", output.status, truncate(&stderr, 2_000)),
            ));
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    async fn plain_get(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(exec_error(NAME, format!("HTTP {}", status.as_u16())));
        }
        resp.text().await.map_err(|e| exec_error(NAME, e.to_string()))
    }
}

#[async_trait]
impl ToolCapability for RenderPage {
    async fn invoke(&self, args: &Value) -> Result<ToolOutput> {
        let url = args["url"].as_str().unwrap_or_default();
        url::Url::parse(url).map_err(|e| exec_error(NAME, format!("bad url '{url}': {e}")))?;
        info!(url, "rendering page");

        let html = match self.dump_dom(url).await? {
            Some(html) => html,
            None => {
                warn!(browser = %self.browser, "browser not found, falling back to plain GET");
                self.plain_get(url).await?
            }
        };
        debug!(url, bytes = html.len(), "page rendered");
        Ok(ToolOutput::ok(truncate(&html, MAX_HTML_CHARS)))
    }
}
