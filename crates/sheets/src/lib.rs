pub mod client;
pub mod store;
pub mod token;

pub use client::GoogleSheetsStore;
pub use store::{InMemoryRecordStore, RecordLookup, RecordStore, StoreError};
pub use token::AccessTokenProvider;
