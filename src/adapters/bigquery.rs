use crate::domain::model::{RowInsertError, TableRef, VisitRow};
use crate::domain::ports::{RowSink, TokenProvider};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    kind: &'static str,
    rows: Vec<InsertAllRow<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRow<'a> {
    insert_id: String,
    json: &'a VisitRow,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowInsertError>,
}

/// Streaming inserts through `tabledata.insertAll`.
pub struct BigQuerySink {
    client: Client,
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
}

impl BigQuerySink {
    pub fn new(client: Client, endpoint: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn insert_all_url(&self, table: &TableRef) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint, table.project, table.dataset, table.table
        )
    }
}

#[async_trait]
impl RowSink for BigQuerySink {
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[VisitRow],
    ) -> Result<Vec<RowInsertError>> {
        let token = self.tokens.access_token().await?;

        // insertId 讓倉儲端能對重送的列去重
        let request = InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            rows: rows
                .iter()
                .map(|row| InsertAllRow {
                    insert_id: uuid::Uuid::new_v4().to_string(),
                    json: row,
                })
                .collect(),
        };

        let url = self.insert_all_url(table);
        tracing::debug!(%url, rows = rows.len(), "Sending insertAll request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::WarehouseError {
                table: table.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: InsertAllResponse = response.json().await?;
        Ok(parsed.insert_errors)
    }
}
