use std::sync::Arc;

use sudsy_core::{classify, compose, DisclosurePolicy, InboundMessage, ReplyOutcome};
use sudsy_line::ReplySender;
use sudsy_sheets::{RecordLookup, RecordStore};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives one verified inbound message through lookup, classification,
/// composition and dispatch. Stateless across events; every failure below
/// the transport boundary folds into a composed fallback reply so the
/// webhook transaction can always acknowledge.
pub struct MessagePipeline {
    store: Arc<dyn RecordStore>,
    sender: Arc<dyn ReplySender>,
    disclosure: DisclosurePolicy,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sender: Arc<dyn ReplySender>,
        disclosure: DisclosurePolicy,
    ) -> Self {
        Self { store, sender, disclosure }
    }

    /// Handles one event end to end and returns the composed reply text.
    /// Never errors: dispatch failures are logged and the event is still
    /// considered acknowledged.
    pub async fn handle_message(&self, message: &InboundMessage) -> String {
        let correlation_id = Uuid::new_v4().simple().to_string();

        info!(
            event_name = "pipeline.event.received",
            correlation_id = %correlation_id,
            identity_key = %message.identity_key,
            "handling inbound message"
        );

        let outcome = self.resolve_outcome(message, &correlation_id).await;
        let reply_text = compose(&outcome, self.disclosure);

        match self.sender.send(&message.reply_token, &reply_text).await {
            Ok(()) => {
                info!(
                    event_name = "pipeline.reply.dispatched",
                    correlation_id = %correlation_id,
                    identity_key = %message.identity_key,
                    "reply dispatched"
                );
            }
            Err(dispatch_error) => {
                // Reply tokens are single-use and the transport already
                // delivered the event; at-most-once, no retry.
                warn!(
                    event_name = "pipeline.reply.dispatch_failed",
                    correlation_id = %correlation_id,
                    identity_key = %message.identity_key,
                    error = %dispatch_error,
                    "reply dispatch failed; acknowledging anyway"
                );
            }
        }

        reply_text
    }

    async fn resolve_outcome(
        &self,
        message: &InboundMessage,
        correlation_id: &str,
    ) -> ReplyOutcome {
        match self.store.lookup(&message.identity_key).await {
            Ok(RecordLookup::Found(record)) => {
                let intent = classify(&message.text);
                info!(
                    event_name = "pipeline.intent.classified",
                    correlation_id = %correlation_id,
                    identity_key = %message.identity_key,
                    intent = intent.as_str(),
                    "record resolved"
                );
                ReplyOutcome::Resolved { record, intent }
            }
            Ok(RecordLookup::NotFound) => {
                info!(
                    event_name = "pipeline.lookup.unknown_identity",
                    correlation_id = %correlation_id,
                    identity_key = %message.identity_key,
                    "identity not in roster; composing registration prompt"
                );
                ReplyOutcome::UnknownIdentity { identity_key: message.identity_key.clone() }
            }
            Err(store_error) => {
                error!(
                    event_name = "pipeline.lookup.failed",
                    correlation_id = %correlation_id,
                    identity_key = %message.identity_key,
                    error = %store_error,
                    "record store failure; composing fallback reply"
                );
                ReplyOutcome::SystemFailure { detail: store_error.to_string() }
            }
        }
    }
}
