use crate::domain::model::FormPayload;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Form body as an ordered payload.
///
/// URL-encoded and multipart bodies are parsed. Any other content type gives
/// an empty payload. Multipart file parts are skipped.
#[derive(Debug, Clone)]
pub struct FormFields(pub FormPayload);

#[derive(Debug)]
pub struct FormRejection {
    status: StatusCode,
    reason: String,
}

impl FormRejection {
    /// Keeps 413 from the body limit; everything else is a parse failure.
    fn new(status: StatusCode, reason: impl ToString) -> Self {
        let status = if status == StatusCode::PAYLOAD_TOO_LARGE {
            status
        } else {
            StatusCode::BAD_REQUEST
        };
        Self {
            status,
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for FormRejection {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status, reason = %self.reason, "Cannot read webhook body");
        let detail = if self.status == StatusCode::PAYLOAD_TOO_LARGE {
            "Request body too large"
        } else {
            "There was an error parsing the body"
        };
        (self.status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = FormRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| FormRejection::new(e.status(), e.body_text()))?;
            let pairs = url::form_urlencoded::parse(&body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()));
            return Ok(FormFields(FormPayload::from_pairs(pairs)));
        }

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| FormRejection::new(e.status(), e.body_text()))?;
            let mut payload = FormPayload::new();

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| FormRejection::new(e.status(), e.body_text()))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if field.file_name().is_some() {
                    tracing::debug!(field = %name, "Skipping uploaded file part");
                    continue;
                }
                let value = field
                    .text()
                    .await
                    .map_err(|e| FormRejection::new(e.status(), e.body_text()))?;
                payload.insert(name, value);
            }
            return Ok(FormFields(payload));
        }

        tracing::debug!(content_type = %content_type, "Non-form body treated as empty form");
        Ok(FormFields(FormPayload::new()))
    }
}
