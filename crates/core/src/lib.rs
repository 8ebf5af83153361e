pub mod config;
pub mod credentials;
pub mod domain;
pub mod intent;
pub mod reply;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use credentials::{CredentialError, Credentials, LineCredentials, ServiceAccountKey};
pub use domain::message::InboundMessage;
pub use domain::record::CustomerRecord;
pub use intent::{classify, Intent};
pub use reply::{compose, DisclosurePolicy, ReplyOutcome};
