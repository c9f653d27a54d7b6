use crate::core::payload::raw_payload;
use crate::core::routing::{route_submissions, Delivery, RoutingTable};
use crate::core::submission::group_submissions;
use crate::domain::model::{FormPayload, IngestOutcome, TableRef, VisitRow};
use crate::domain::ports::RowSink;
use crate::utils::error::{IngestError, Result};
use chrono::{NaiveDateTime, Timelike, Utc};
use std::sync::Arc;

const WHOLE_SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MICROSECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// ISO-8601 without offset. The six-digit fraction is left out on a whole
/// second.
pub fn format_received_at(at: NaiveDateTime) -> String {
    let format = if at.nanosecond() / 1_000 == 0 {
        WHOLE_SECOND_FORMAT
    } else {
        MICROSECOND_FORMAT
    };
    at.format(format).to_string()
}

/// Turns one webhook delivery into warehouse rows and writes them.
#[derive(Clone)]
pub struct IngestEngine {
    routing: Arc<RoutingTable>,
    sink: Arc<dyn RowSink>,
}

impl IngestEngine {
    pub fn new(routing: RoutingTable, sink: Arc<dyn RowSink>) -> Self {
        Self {
            routing: Arc::new(routing),
            sink,
        }
    }

    pub async fn ingest(&self, form: &FormPayload) -> Result<IngestOutcome> {
        self.ingest_at(form, Utc::now().naive_utc()).await
    }

    pub async fn ingest_at(
        &self,
        form: &FormPayload,
        received_at: NaiveDateTime,
    ) -> Result<IngestOutcome> {
        // Extract
        let raw = raw_payload(form)?;
        let received_at = format_received_at(received_at);
        tracing::debug!(fields = form.len(), "Received visitor payload");

        // Transform
        let submissions = group_submissions(form);
        let delivery = Delivery {
            form,
            raw_payload: &raw,
            received_at: &received_at,
        };
        let batches = route_submissions(&delivery, &submissions, &self.routing);
        tracing::debug!(
            submissions = submissions.len(),
            tables = batches.len(),
            "Routed questionnaire submissions"
        );

        if batches.is_empty() {
            return Ok(IngestOutcome::Nothing);
        }

        // Load
        self.load(batches).await
    }

    async fn load(&self, batches: Vec<(TableRef, Vec<VisitRow>)>) -> Result<IngestOutcome> {
        let mut rows_inserted = 0;
        let mut tables_updated = Vec::with_capacity(batches.len());
        let mut rejected = Vec::new();

        for (table, rows) in &batches {
            let table_id = table.to_string();
            tables_updated.push(table_id.clone());

            let errors = self
                .sink
                .insert_rows(table, rows)
                .await
                .map_err(|e| match e {
                    IngestError::WarehouseError { .. } => e,
                    other => IngestError::WarehouseError {
                        table: table_id.clone(),
                        message: other.to_string(),
                    },
                })?;

            if errors.is_empty() {
                rows_inserted += rows.len();
                tracing::info!(table = %table_id, rows = rows.len(), "✅ Rows inserted");
            } else {
                tracing::warn!(
                    table = %table_id,
                    failed_rows = errors.len(),
                    "❌ Warehouse rejected rows"
                );
                rejected.push((table_id, errors));
            }
        }

        if !rejected.is_empty() {
            return Ok(IngestOutcome::Rejected { errors: rejected });
        }

        Ok(IngestOutcome::Inserted {
            rows_inserted,
            tables_updated,
        })
    }
}
