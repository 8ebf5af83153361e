use serde::Deserialize;
use sudsy_core::InboundMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookParseError {
    #[error("webhook payload could not be decoded: {0}")]
    Decode(String),
}

/// Verified webhook delivery. One delivery may carry several events.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, WebhookParseError> {
    serde_json::from_slice(body).map_err(|err| WebhookParseError::Decode(err.to_string()))
}

/// Extracts the text-message events the pipeline handles. Events of other
/// types, and text events missing a sender id or reply token, are skipped.
pub fn text_messages(payload: &WebhookPayload) -> Vec<InboundMessage> {
    payload.events.iter().filter_map(text_message).collect()
}

fn text_message(event: &WebhookEvent) -> Option<InboundMessage> {
    if event.event_type != "message" {
        return None;
    }
    let message = event.message.as_ref()?;
    if message.message_type != "text" {
        return None;
    }

    let text = message.text.as_deref()?;
    let user_id = event.source.as_ref()?.user_id.as_deref()?;
    let reply_token = event.reply_token.as_deref()?;
    Some(InboundMessage::new(user_id, text, reply_token))
}
