use crate::domain::ports::TokenProvider;
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// A fixed bearer token, for local runs and emulators.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Fetches the runtime service account's token from the metadata server and
/// reuses it until shortly before it expires.
pub struct MetadataServerToken {
    client: Client,
    endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let url = format!("{}{}", self.endpoint, TOKEN_PATH);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| IngestError::TokenError {
                message: format!("metadata server unreachable: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(IngestError::TokenError {
                message: format!("metadata server returned {}", response.status()),
            });
        }

        let body: MetadataTokenResponse =
            response.json().await.map_err(|e| IngestError::TokenError {
                message: format!("malformed token response: {}", e),
            })?;

        tracing::debug!(expires_in = body.expires_in, "Fetched access token");
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.access_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(GET)
                .path(TOKEN_PATH)
                .header("Metadata-Flavor", "Google");
            then.status(200).json_body(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            }));
        });

        let provider = MetadataServerToken::new(Client::new(), server.base_url());
        assert_eq!(provider.access_token().await.unwrap(), "ya29.token");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.token");

        token_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_metadata_token_near_expiry_is_refreshed() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(GET).path(TOKEN_PATH);
            then.status(200).json_body(serde_json::json!({
                "access_token": "short-lived",
                "expires_in": 30
            }));
        });

        let provider = MetadataServerToken::new(Client::new(), server.base_url());
        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();

        token_mock.assert_hits(2);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_token_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(TOKEN_PATH);
            then.status(404);
        });

        let provider = MetadataServerToken::new(Client::new(), server.base_url());
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, IngestError::TokenError { .. }));
    }
}
