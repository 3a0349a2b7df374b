use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use quest_core::{ArgKind, ArgSchema, Result, ToolCapability, ToolOutput};
use quest_runtime::ToolDescriptor;

use crate::exec_error;

pub const NAME: &str = "post_request";

pub fn descriptor(tool: Arc<PostRequest>, timeout: Duration) -> ToolDescriptor {
    ToolDescriptor::new(
        NAME,
        "POST a JSON payload (typically an answer submission) and return the status code and \
         response body. Credentials are filled in automatically.",
        timeout,
        ArgSchema::new()
            .required("url", ArgKind::String, "absolute URL to post to")
            .required("payload", ArgKind::Object, "JSON object body"),
        tool,
    )
}

/// Posts JSON answers. `email` and `secret` are filled from the task configuration when the
/// payload lacks them, so the secret never passes through the reasoning provider.
pub struct PostRequest {
    email: Option<String>,
    secret: Option<String>,
    client: reqwest::Client,
}

impl PostRequest {
    pub fn new(email: Option<String>, secret: Option<String>) -> Self {
        Self {
            email,
            secret,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Insert configured credentials for keys the payload does not already carry.
    pub fn fill_credentials(&self, payload: &mut Value) {
        let Some(map) = payload.as_object_mut() else {
            return;
        };
        for (key, value) in [("email", &self.email), ("secret", &self.secret)] {
            if let Some(value) = value
                && map.get(key).is_none_or(Value::is_null)
            {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }
}

#[async_trait]
impl ToolCapability for PostRequest {
    async fn invoke(&self, args: &Value) -> Result<ToolOutput> {
        let url = args["url"].as_str().unwrap_or_default();
        url::Url::parse(url).map_err(|e| exec_error(NAME, format!("bad url '{url}': {e}")))?;
        let mut payload = args["payload"].clone();
        self.fill_credentials(&mut payload);
        info!(url, "posting payload");

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| exec_error(NAME, e.to_string()))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| json!({ "text": text }));
        let report = json!({
            "status_code": status.as_u16(),
            "response": body,
        });
        let content = serde_json::to_string_pretty(&report)?;

        if status.is_success() {
            Ok(ToolOutput::ok(content).with_data(report))
        } else {
            warn!(url, status = status.as_u16(), "post rejected");
            Ok(ToolOutput::failed(content).with_data(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_credentials_only_when_absent() {
        let tool = PostRequest::new(Some("me@example.com".into()), Some("s3cret".into()));

        let mut payload = json!({"answer": 42});
        tool.fill_credentials(&mut payload);
        assert_eq!(payload["email"], "me@example.com");
        assert_eq!(payload["secret"], "s3cret");

        let mut explicit = json!({"answer": 1, "email": "other@example.com", "secret": null});
        tool.fill_credentials(&mut explicit);
        assert_eq!(explicit["email"], "other@example.com");
        assert_eq!(explicit["secret"], "s3cret");
    }

    #[test]
    fn test_fill_credentials_without_config() {
        let tool = PostRequest::new(None, None);
        let mut payload = json!({"answer": 42});
        tool.fill_credentials(&mut payload);
        assert_eq!(payload, json!({"answer": 42}));
    }
}
