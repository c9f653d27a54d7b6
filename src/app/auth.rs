use crate::config::toml_config::AuthConfig;
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Expected HTTP Basic credentials.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both halves are always compared so timing does not reveal which one
    /// was wrong.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

impl From<AuthConfig> for Credentials {
    fn from(config: AuthConfig) -> Self {
        Self::new(config.username, config.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    NotAuthenticated,
    InvalidCredentials,
    Unauthorized,
}

impl AuthRejection {
    pub fn detail(&self) -> &'static str {
        match self {
            AuthRejection::NotAuthenticated => "Not authenticated",
            AuthRejection::InvalidCredentials => "Invalid authentication credentials",
            AuthRejection::Unauthorized => "Unauthorized",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": self.detail() })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
        response
    }
}

/// Decodes `Authorization: Basic <base64(user:pass)>`.
pub fn parse_basic(header: Option<&HeaderValue>) -> Result<(String, String), AuthRejection> {
    let value = header
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthRejection::NotAuthenticated)?;
    let value = value.trim();
    // `Basic` without a payload still counts as a Basic attempt
    let (scheme, encoded) = value.split_once(' ').unwrap_or((value, ""));
    if scheme.is_empty() || !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthRejection::NotAuthenticated);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthRejection::InvalidCredentials)?;
    if !decoded.is_ascii() {
        return Err(AuthRejection::InvalidCredentials);
    }
    let decoded = String::from_utf8(decoded).map_err(|_| AuthRejection::InvalidCredentials)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthRejection::InvalidCredentials)?;

    Ok((username.to_string(), password.to_string()))
}

/// Extractor that only succeeds for requests carrying the expected
/// credentials.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

#[async_trait]
impl<S> FromRequestParts<S> for Authorized
where
    Arc<Credentials>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let (username, password) = parse_basic(parts.headers.get(AUTHORIZATION))?;
        let expected = Arc::<Credentials>::from_ref(state);

        if expected.verify(&username, &password) {
            Ok(Authorized)
        } else {
            tracing::warn!(username = %username, "Rejected webhook credentials");
            Err(AuthRejection::Unauthorized)
        }
    }
}
