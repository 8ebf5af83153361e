use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

/// Production reply endpoint; tests point `with_endpoint` at a local server.
pub const DEFAULT_REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Request(String),
    #[error("reply api returned {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// Outbound dispatch seam. `send` consumes the event's single-use reply
/// token; callers invoke it exactly once per verified event.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

pub struct HttpReplySender {
    client: reqwest::Client,
    access_token: SecretString,
    endpoint: String,
}

impl HttpReplySender {
    pub fn new(access_token: SecretString) -> Self {
        Self::with_endpoint(access_token, DEFAULT_REPLY_URL)
    }

    pub fn with_endpoint(access_token: SecretString, endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), access_token, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl ReplySender for HttpReplySender {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let body = json!({
            "replyToken": reply_token,
            "messages": [{"type": "text", "text": text}],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| ReplyError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(ReplyError::Api { status: status.as_u16(), detail });
        }

        Ok(())
    }
}

/// In-memory sender for tests: records every attempt and optionally fails
/// each one with a scripted error.
#[derive(Default)]
pub struct RecordingReplySender {
    sent: Mutex<Vec<(String, String)>>,
    fail_with: Option<ReplyError>,
}

impl RecordingReplySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(error: ReplyError) -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_with: Some(error) }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ReplySender for RecordingReplySender {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        self.sent.lock().await.push((reply_token.to_owned(), text.to_owned()));

        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
