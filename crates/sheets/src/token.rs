use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sudsy_core::ServiceAccountKey;
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::StoreError;

/// Read-only scopes: row lookups plus resolving the spreadsheet by title.
const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets.readonly https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Google caps assertion lifetime at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Exchanges the service-account key for short-lived access tokens via the
/// OAuth2 JWT-bearer grant, caching the token across lookups and
/// re-exchanging shortly before expiry.
pub struct AccessTokenProvider {
    client: reqwest::Client,
    key: ServiceAccountKey,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenProvider {
    pub fn new(client: reqwest::Client, key: ServiceAccountKey) -> Self {
        Self { client, key, cached: Mutex::new(None) }
    }

    pub async fn bearer_token(&self) -> Result<String, StoreError> {
        let now = Utc::now();
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(now).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, StoreError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let encoding_key =
            EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes()).map_err(
                |err| StoreError::Auth(format!("service account private key was rejected: {err}")),
            )?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|err| StoreError::Auth(format!("could not sign token assertion: {err}")))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|err| StoreError::Transport(format!("token endpoint unreachable: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_else(|_| "<no body>".to_string());
            return Err(StoreError::Auth(format!("token exchange failed ({status}): {detail}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| StoreError::Decode(format!("token response: {err}")))?;

        debug!(
            event_name = "store.sheets.token_exchanged",
            client_email = %self.key.client_email,
            "access token refreshed"
        );

        Ok(CachedToken {
            value: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::CachedToken;

    #[test]
    fn token_is_fresh_until_the_expiry_margin() {
        let now = Utc::now();
        let token =
            CachedToken { value: "t".to_string(), expires_at: now + Duration::seconds(600) };

        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(541)));
        assert!(!token.is_fresh(now + Duration::seconds(600)));
    }
}
