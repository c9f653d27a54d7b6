use crate::adapters::{BigQuerySink, MetadataServerToken, StaticToken};
use crate::app::auth::{Authorized, Credentials};
use crate::app::form::FormFields;
use crate::config::toml_config::{TokenSource, WarehouseConfig, WebhookConfig};
use crate::core::ingest::IngestEngine;
use crate::domain::model::IngestOutcome;
use crate::domain::ports::{RowSink, TokenProvider};
use crate::utils::error::Result;
use crate::utils::validation::{validate_required_field, Validate};
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub const KIND: &str = "visitor-webhook";

#[derive(Clone, FromRef)]
pub struct WebhookState {
    pub engine: IngestEngine,
    pub credentials: Arc<Credentials>,
}

pub fn router(path: &str, state: WebhookState, max_body_bytes: usize) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_bytes));

    Router::new()
        .route(path, post(visitor_webhook))
        .route("/health", get(health_check))
        .layer(middleware)
        .with_state(state)
}

/// Builds the webhook application from its `[app]` table.
pub fn factory(value: toml::Value) -> Result<Router> {
    let config = WebhookConfig::from_value(value)?;
    config.validate()?;

    let credentials = Credentials::from(config.credentials()?);
    let sink = warehouse_sink(&config.warehouse)?;
    let engine = IngestEngine::new(config.routing_table()?, sink);

    tracing::info!(
        path = %config.path,
        routes = config.questionnaires.len(),
        warehouse = %config.warehouse.endpoint,
        "Visitor webhook configured"
    );

    let state = WebhookState {
        engine,
        credentials: Arc::new(credentials),
    };
    Ok(router(&config.path, state, config.max_body_bytes))
}

fn warehouse_sink(config: &WarehouseConfig) -> Result<Arc<dyn RowSink>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?;

    let tokens: Arc<dyn TokenProvider> = match config.token {
        TokenSource::Static => {
            let token = validate_required_field("warehouse.access_token", &config.access_token)?;
            Arc::new(StaticToken::new(token.clone()))
        }
        TokenSource::Metadata => Arc::new(MetadataServerToken::new(
            client.clone(),
            config.metadata_endpoint.clone(),
        )),
    };

    Ok(Arc::new(BigQuerySink::new(
        client,
        config.endpoint.clone(),
        tokens,
    )))
}

async fn visitor_webhook(
    State(engine): State<IngestEngine>,
    _auth: Authorized,
    FormFields(form): FormFields,
) -> Response {
    match engine.ingest(&form).await {
        Ok(IngestOutcome::Nothing) => {
            (StatusCode::OK, Json(json!({ "status": "ok", "rows_inserted": 0 }))).into_response()
        }
        Ok(IngestOutcome::Inserted {
            rows_inserted,
            tables_updated,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "rows_inserted": rows_inserted,
                "tables_updated": tables_updated,
            })),
        )
            .into_response(),
        Ok(IngestOutcome::Rejected { errors }) => {
            let detail: Vec<serde_json::Value> = errors
                .into_iter()
                .map(|(table, row_errors)| {
                    let mut entry = serde_json::Map::new();
                    entry.insert(table, json!(row_errors));
                    serde_json::Value::Object(entry)
                })
                .collect();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                category = ?e.category(),
                "❌ Visitor webhook failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
