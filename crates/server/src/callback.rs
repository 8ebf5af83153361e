use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use secrecy::{ExposeSecret, SecretString};
use sudsy_line::{signature, webhook};
use tracing::{info, warn};

use crate::pipeline::MessagePipeline;

#[derive(Clone)]
pub struct CallbackState {
    channel_secret: SecretString,
    pipeline: Arc<MessagePipeline>,
}

pub fn router(channel_secret: SecretString, pipeline: Arc<MessagePipeline>) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .with_state(CallbackState { channel_secret, pipeline })
}

/// Webhook entry point. Unverified deliveries are rejected with 400 before
/// anything else runs; every verified delivery acknowledges with 200 `OK`,
/// even when handling failed internally, so the transport does not retry.
pub async fn callback(
    State(state): State<CallbackState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let header = headers.get(signature::SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    if let Err(signature_error) =
        signature::verify(state.channel_secret.expose_secret().as_bytes(), &body, header)
    {
        warn!(
            event_name = "ingress.line.signature_rejected",
            error = %signature_error,
            "rejecting webhook delivery"
        );
        return (StatusCode::BAD_REQUEST, "signature validation failed");
    }

    let payload = match webhook::parse_payload(&body) {
        Ok(payload) => payload,
        Err(parse_error) => {
            // Verified but undecodable; acknowledge so the transport does
            // not redeliver it forever.
            warn!(
                event_name = "ingress.line.payload_undecodable",
                error = %parse_error,
                "acknowledging undecodable delivery"
            );
            return (StatusCode::OK, "OK");
        }
    };

    let messages = webhook::text_messages(&payload);
    info!(
        event_name = "ingress.line.delivery_received",
        event_count = payload.events.len(),
        message_count = messages.len(),
        "verified webhook delivery"
    );

    for message in &messages {
        state.pipeline.handle_message(message).await;
    }

    (StatusCode::OK, "OK")
}
