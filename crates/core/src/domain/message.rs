/// One inbound chat event, immutable once extracted from the webhook
/// payload. The reply token is single-use; dispatch consumes it exactly
/// once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub identity_key: String,
    pub text: String,
    pub reply_token: String,
}

impl InboundMessage {
    pub fn new(
        identity_key: impl Into<String>,
        text: &str,
        reply_token: impl Into<String>,
    ) -> Self {
        Self {
            identity_key: identity_key.into(),
            text: text.trim().to_string(),
            reply_token: reply_token.into(),
        }
    }
}
