use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use quest_core::{ArgKind, ArgSchema, Result, ToolCapability, ToolOutput};
use quest_runtime::ToolDescriptor;

use crate::exec_error;

pub const NAME: &str = "download_file";
const DEFAULT_FILENAME: &str = "downloaded_file";

pub fn descriptor(tool: Arc<DownloadFile>, timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "Download a file into the working directory and return its local path.",
        timeout,
        ArgSchema::new()
            .required("url", ArgKind::String, "absolute URL of the file")
            .optional(
                "filename",
                ArgKind::String,
                "name to save under; derived from the URL when omitted",
            ),
        tool,
    )
}

/// Reduce a requested name to a bare file name inside the work dir.
pub fn safe_filename(requested: &str) -> String {
    let base = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        base.to_string()
    }
}

/// Name from the last path segment of `url`.
pub fn filename_from_url(url: &url::Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    safe_filename(last)
}

pub struct DownloadFile {
    work_dir: PathBuf,
    client: reqwest::Client,
}

impl DownloadFile {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn fetch_to(&self, url: url::Url, dest: &Path) -> Result<u64> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(exec_error(
                NAME,
                format!("download failed with HTTP {}", status.as_u16()),
            ));
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| exec_error(NAME, e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl ToolCapability for DownloadFile {
    async fn invoke(&self, args: &Value) -> Result<ToolOutput> {
        let raw = args["url"].as_str().unwrap_or_default();
        let url =
            url::Url::parse(raw).map_err(|e| exec_error(NAME, format!("bad url '{raw}': {e}")))?;
        let name = match args.get("filename").and_then(Value::as_str) {
            Some(requested) => safe_filename(requested),
            None => filename_from_url(&url),
        };
        let dest = self.work_dir.join(&name);
        info!(url = %url, dest = %dest.display(), "downloading");

        match self.fetch_to(url, &dest).await {
            Ok(bytes) => {
                let path = dest.display().to_string();
                Ok(ToolOutput::ok(format!("saved {bytes} bytes to {path}"))
                    .with_data(json!({ "path": path, "bytes": bytes })))
            }
            Err(e) => {
                if tokio::fs::remove_file(&dest).await.is_ok() {
                    warn!(dest = %dest.display(), "removed partial download");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("data.csv"), "data.csv");
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename("..\\secret.txt"), "secret.txt");
        assert_eq!(safe_filename("dir/"), DEFAULT_FILENAME);
        assert_eq!(safe_filename(".."), DEFAULT_FILENAME);
        assert_eq!(safe_filename(""), DEFAULT_FILENAME);
    }

    #[test]
    fn test_filename_from_url() {
        let url = url::Url::parse("https://example.com/files/audio.opus?x=1").unwrap();
        assert_eq!(filename_from_url(&url), "audio.opus");
        let bare = url::Url::parse("https://example.com/").unwrap();
        assert_eq!(filename_from_url(&bare), DEFAULT_FILENAME);
    }
}
