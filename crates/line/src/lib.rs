pub mod reply;
pub mod signature;
pub mod webhook;

pub use reply::{HttpReplySender, RecordingReplySender, ReplyError, ReplySender, DEFAULT_REPLY_URL};
pub use signature::{sign, verify, SignatureError, SIGNATURE_HEADER};
pub use webhook::{parse_payload, text_messages, WebhookParseError, WebhookPayload};
