// src/delivery.rs

use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No destination configured; nothing was sent.
    Skipped,
    Sent { status: StatusCode, body: String },
    /// The request never got an answer.
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { status, .. } if status.is_success())
    }
}

/// Thin transport to the remote collector. No queueing, no retries.
#[derive(Clone)]
pub struct DeliveryClient {
    http:     Client,
    text_url: Option<String>,
    file_url: Option<String>,
}

impl DeliveryClient {
    pub fn new(text_url: Option<String>, file_url: Option<String>) -> Self {
        let file_url = file_url.or_else(|| text_url.clone());
        Self { http: Client::new(), text_url, file_url }
    }

    pub fn relays_text(&self) -> bool {
        self.text_url.is_some()
    }

    /// Posts one text batch. Failures are logged and swallowed: the local log
    /// file stays the record of what was said.
    pub async fn send_batch(&self, text: &str) -> DeliveryOutcome {
        let Some(url) = self.text_url.as_deref() else {
            debug!(bytes = text.len(), "no text destination, batch kept local");
            return DeliveryOutcome::Skipped;
        };

        let resp = match self.http.post(url).json(&json!({ "content": text })).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "text batch delivery failed");
                return DeliveryOutcome::Failed(e.to_string());
            }
        };

        let status = resp.status();
        // 204 No Content 也算成功
        let body = if status == StatusCode::NO_CONTENT {
            String::new()
        } else {
            resp.text().await.unwrap_or_default()
        };
        if status.is_success() {
            debug!(%status, "text batch delivered");
        } else {
            warn!(%status, body = %body, "collector rejected text batch");
        }
        DeliveryOutcome::Sent { status, body }
    }

    /// Uploads one file as multipart `payload_json` + `files[0]`.
    /// Connection errors come back as `Err`; HTTP errors as a non-2xx status.
    pub async fn send_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
        caption: &str,
    ) -> AppResult<DeliveryOutcome> {
        let Some(url) = self.file_url.as_deref() else {
            debug!(file = name, "no file destination, upload skipped");
            return Ok(DeliveryOutcome::Skipped);
        };

        let meta = Part::text(json!({ "content": caption }).to_string()).mime_str("application/json")?;
        let file = Part::bytes(bytes).file_name(name.to_string()).mime_str(content_type)?;
        let form = Form::new().part("payload_json", meta).part("files[0]", file);

        let resp   = self.http.post(url).multipart(form).send().await?;
        let status = resp.status();
        let body   = resp.text().await.unwrap_or_default();
        debug!(file = name, %status, "file upload answered");
        Ok(DeliveryOutcome::Sent { status, body })
    }
}
