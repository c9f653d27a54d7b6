use crate::domain::model::{FormPayload, Submission, TableRef, TableSchema, VisitRow};
use crate::utils::error::{IngestError, Result};
use serde::{Deserialize, Serialize};

pub const EVERY_VISIT_TABLE: &str = "city-of-swan-youth-centres.every_visit_data.every_visit";
pub const ANNUAL_VISIT_TABLE: &str = "city-of-swan-youth-centres.annual_visit_data.annual_visit";

/// Maps a questionnaire id to its destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireRoute {
    pub id: String,
    pub table: String,
    pub schema: TableSchema,
}

pub fn default_routes() -> Vec<QuestionnaireRoute> {
    vec![
        QuestionnaireRoute {
            id: "8895".to_string(),
            table: EVERY_VISIT_TABLE.to_string(),
            schema: TableSchema::EveryVisit,
        },
        QuestionnaireRoute {
            id: "8208".to_string(),
            table: ANNUAL_VISIT_TABLE.to_string(),
            schema: TableSchema::AnnualVisit,
        },
    ]
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: Vec<(String, TableRef, TableSchema)>,
}

impl RoutingTable {
    pub fn new(routes: &[QuestionnaireRoute]) -> Result<Self> {
        let mut resolved: Vec<(String, TableRef, TableSchema)> = Vec::with_capacity(routes.len());

        for route in routes {
            if resolved.iter().any(|(id, _, _)| *id == route.id) {
                return Err(IngestError::InvalidConfigValueError {
                    field: "questionnaires.id".to_string(),
                    value: route.id.clone(),
                    reason: "Questionnaire id is routed more than once".to_string(),
                });
            }

            let table = TableRef::parse(&route.table)?;
            if let Some((_, _, schema)) = resolved.iter().find(|(_, t, _)| *t == table) {
                if *schema != route.schema {
                    return Err(IngestError::InvalidConfigValueError {
                        field: "questionnaires.schema".to_string(),
                        value: route.table.clone(),
                        reason: "Table is routed with two different schemas".to_string(),
                    });
                }
            }

            resolved.push((route.id.clone(), table, route.schema));
        }

        Ok(Self { routes: resolved })
    }

    pub fn route(&self, questionnaire_id: &str) -> Option<(&TableRef, TableSchema)> {
        self.routes
            .iter()
            .find(|(id, _, _)| id == questionnaire_id)
            .map(|(_, table, schema)| (table, *schema))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Form-level values shared by every row of one delivery.
#[derive(Debug, Clone)]
pub struct Delivery<'a> {
    pub form: &'a FormPayload,
    pub raw_payload: &'a str,
    pub received_at: &'a str,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub fn build_row(delivery: &Delivery<'_>, submission: &Submission, schema: TableSchema) -> VisitRow {
    let form = delivery.form;

    let responder_name =
        non_empty(submission.get("guest_name")).or_else(|| form.get("name"));
    let submitted = non_empty(submission.get("created")).or_else(|| form.get("signed_in"));

    let schema_columns = schema
        .extra_columns()
        .iter()
        .map(|column| (column.to_string(), serde_json::Value::Null))
        .collect();

    VisitRow {
        responder_name: responder_name.map(str::to_string),
        submitted: submitted.map(str::to_string),
        location: form.get("location_name").map(str::to_string),
        questionnaire_name: submission.get("questionnaire_name").map(str::to_string),
        reason_for_visit: None,
        young_person: None,
        raw_payload: delivery.raw_payload.to_string(),
        received_at: delivery.received_at.to_string(),
        schema_columns,
    }
}

/// Builds rows for every routable submission, grouped per table in the order
/// each table is first needed.
pub fn route_submissions(
    delivery: &Delivery<'_>,
    submissions: &[Submission],
    routing: &RoutingTable,
) -> Vec<(TableRef, Vec<VisitRow>)> {
    let mut batches: Vec<(TableRef, Vec<VisitRow>)> = Vec::new();

    for submission in submissions {
        let Some(questionnaire_id) = submission.get("questionnaire_id") else {
            continue;
        };
        let Some((table, schema)) = routing.route(questionnaire_id) else {
            // 未知問卷直接略過
            tracing::debug!(questionnaire_id, "No route for questionnaire");
            continue;
        };

        let row = build_row(delivery, submission, schema);
        match batches.iter_mut().find(|(t, _)| t == table) {
            Some((_, rows)) => rows.push(row),
            None => batches.push((table.clone(), vec![row])),
        }
    }

    batches
}
