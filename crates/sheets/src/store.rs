use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sudsy_core::CustomerRecord;
use thiserror::Error;

/// Failure modes of the record store, all surfaced as values so the
/// pipeline can branch deterministically. A key that simply is not in the
/// roster is `RecordLookup::NotFound`, never an error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store authentication failed: {0}")]
    Auth(String),
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("spreadsheet `{0}` was not found")]
    StoreNotFound(String),
    #[error("store response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordLookup {
    Found(CustomerRecord),
    NotFound,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact-match search for `identity_key` against the key column.
    async fn lookup(&self, identity_key: &str) -> Result<RecordLookup, StoreError>;

    /// Connectivity probe for the health endpoint; must not read rows.
    async fn probe(&self) -> Result<(), StoreError>;
}

/// Keyed rows held in memory, with an optional scripted failure. Used by
/// tests and local smoke runs; the lookup counter backs the
/// "rejected requests never reach the store" assertions.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: HashMap<String, CustomerRecord>,
    fail_with: Option<StoreError>,
    lookups: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CustomerRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.identity_key.clone(), record))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing_with(error: StoreError) -> Self {
        Self { fail_with: Some(error), ..Self::default() }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn lookup(&self, identity_key: &str) -> Result<RecordLookup, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        Ok(match self.records.get(identity_key) {
            Some(record) => RecordLookup::Found(record.clone()),
            None => RecordLookup::NotFound,
        })
    }

    async fn probe(&self) -> Result<(), StoreError> {
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use sudsy_core::CustomerRecord;

    use super::{InMemoryRecordStore, RecordLookup, RecordStore, StoreError};

    fn record(identity_key: &str) -> CustomerRecord {
        CustomerRecord::from_row(&[
            identity_key.to_string(),
            "Tom".to_string(),
            "สมชาย".to_string(),
            "รอดำเนินการ".to_string(),
            "250".to_string(),
        ])
    }

    #[tokio::test]
    async fn present_key_is_found_and_absent_key_is_not_found() {
        let store = InMemoryRecordStore::with_records([record("U123")]);

        let found = store.lookup("U123").await.expect("lookup");
        assert!(matches!(found, RecordLookup::Found(ref r) if r.display_name == "สมชาย"));

        let missing = store.lookup("U999").await.expect("lookup");
        assert_eq!(missing, RecordLookup::NotFound);
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_as_store_error() {
        let store = InMemoryRecordStore::failing_with(StoreError::Auth("expired".to_string()));

        let error = store.lookup("U123").await.expect_err("must fail");
        assert_eq!(error, StoreError::Auth("expired".to_string()));
        assert!(store.probe().await.is_err());
    }
}
