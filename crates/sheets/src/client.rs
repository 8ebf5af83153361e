use reqwest::StatusCode;
use serde::Deserialize;
use sudsy_core::{CustomerRecord, ServiceAccountKey};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::store::{RecordLookup, RecordStore, StoreError};
use crate::token::AccessTokenProvider;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_VALUES_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
/// Key column plus the four payload columns; an unqualified range reads the
/// first visible sheet.
const ROSTER_RANGE: &str = "A:E";

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Record store backed by a Google spreadsheet, addressed by title. The
/// access token and the resolved spreadsheet id are cached across lookups;
/// the token refreshes itself near expiry.
pub struct GoogleSheetsStore {
    client: reqwest::Client,
    tokens: AccessTokenProvider,
    spreadsheet_title: String,
    spreadsheet_id: Mutex<Option<String>>,
}

impl GoogleSheetsStore {
    pub fn new(key: ServiceAccountKey, spreadsheet_title: impl Into<String>) -> Self {
        let client = reqwest::Client::new();
        Self {
            tokens: AccessTokenProvider::new(client.clone(), key),
            client,
            spreadsheet_title: spreadsheet_title.into(),
            spreadsheet_id: Mutex::new(None),
        }
    }

    async fn spreadsheet_id(&self, bearer: &str) -> Result<String, StoreError> {
        let mut cached = self.spreadsheet_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            escape_query_term(&self.spreadsheet_title)
        );
        let response = self
            .client
            .get(DRIVE_FILES_URL)
            .bearer_auth(bearer)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)"), ("pageSize", "1")])
            .send()
            .await
            .map_err(|err| StoreError::Transport(format!("drive search unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error("drive search", status, response).await);
        }

        let listing: DriveFileList = response
            .json()
            .await
            .map_err(|err| StoreError::Decode(format!("drive search response: {err}")))?;

        let file = listing
            .files
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::StoreNotFound(self.spreadsheet_title.clone()))?;

        info!(
            event_name = "store.sheets.spreadsheet_resolved",
            spreadsheet_title = %file.name,
            spreadsheet_id = %file.id,
            "resolved spreadsheet by title"
        );

        *cached = Some(file.id.clone());
        Ok(file.id)
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let bearer = self.tokens.bearer_token().await?;
        let spreadsheet_id = self.spreadsheet_id(&bearer).await?;

        let url = format!("{SHEETS_VALUES_URL}/{spreadsheet_id}/values/{ROSTER_RANGE}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&bearer)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|err| StoreError::Transport(format!("values read unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error("values read", status, response).await);
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|err| StoreError::Decode(format!("values response: {err}")))?;

        Ok(range.values)
    }
}

#[async_trait::async_trait]
impl RecordStore for GoogleSheetsStore {
    async fn lookup(&self, identity_key: &str) -> Result<RecordLookup, StoreError> {
        let rows = self.fetch_rows().await?;

        debug!(
            event_name = "store.sheets.rows_fetched",
            row_count = rows.len(),
            "scanning key column"
        );

        Ok(match match_row(&rows, identity_key) {
            Some(row) => RecordLookup::Found(CustomerRecord::from_row(row)),
            None => RecordLookup::NotFound,
        })
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let bearer = self.tokens.bearer_token().await?;
        self.spreadsheet_id(&bearer).await?;
        Ok(())
    }
}

/// First row whose key column matches exactly. Header rows fall out
/// naturally: an identity key never equals a column heading.
fn match_row<'a>(rows: &'a [Vec<String>], identity_key: &str) -> Option<&'a Vec<String>> {
    rows.iter().find(|row| row.first().map(String::as_str) == Some(identity_key))
}

fn escape_query_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn api_error(context: &str, status: StatusCode, response: reqwest::Response) -> StoreError {
    let detail = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
    let message = format!("{context} failed ({status}): {detail}");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(message),
        StatusCode::NOT_FOUND => StoreError::StoreNotFound(message),
        _ => StoreError::Transport(message),
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_query_term, match_row};

    fn rows() -> Vec<Vec<String>> {
        vec![
            vec!["user_id".to_string(), "nickname".to_string(), "name".to_string()],
            vec!["U123".to_string(), "Tom".to_string(), "สมชาย".to_string()],
            vec!["U456".to_string()],
        ]
    }

    #[test]
    fn match_is_exact_on_the_key_column() {
        let rows = rows();

        let row = match_row(&rows, "U123").expect("row should match");
        assert_eq!(row[2], "สมชาย");

        assert!(match_row(&rows, "U12").is_none(), "prefixes must not match");
        assert!(match_row(&rows, "Tom").is_none(), "other columns must not match");
        assert!(match_row(&rows, "U999").is_none());
    }

    #[test]
    fn empty_sheet_matches_nothing() {
        assert!(match_row(&[], "U123").is_none());
    }

    #[test]
    fn query_terms_escape_quotes() {
        assert_eq!(escape_query_term("it's"), "it\\'s");
        assert_eq!(escape_query_term("plain"), "plain");
    }
}
