use crate::utils::error::{IngestError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered form fields as received by the webhook.
///
/// A repeated key keeps its first position and its last value.
#[derive(Debug, Clone, Default)]
pub struct FormPayload {
    fields: IndexMap<String, String>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.fields.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// 欄位順序也要相同
impl PartialEq for FormPayload {
    fn eq(&self, other: &Self) -> bool {
        self.fields.iter().eq(other.fields.iter())
    }
}

impl Eq for FormPayload {}

/// One `questionnaireSubmissions[<index>][...]` group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub index: String,
    pub fields: FormPayload,
}

impl Submission {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            fields: FormPayload::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field)
    }
}

/// Column layout of a destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSchema {
    EveryVisit,
    AnnualVisit,
}

impl TableSchema {
    /// Columns only this schema carries. They are always written as null.
    pub fn extra_columns(&self) -> &'static [&'static str] {
        match self {
            TableSchema::EveryVisit => &["purpose_of_visit"],
            TableSchema::AnnualVisit => &["age"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(table_id: &str) -> Result<Self> {
        crate::utils::validation::validate_table_id("table", table_id)?;
        let mut parts = table_id.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(project), Some(dataset), Some(table)) => Ok(Self {
                project: project.to_string(),
                dataset: dataset.to_string(),
                table: table.to_string(),
            }),
            _ => Err(IngestError::ProcessingError {
                message: format!("malformed table id {}", table_id),
            }),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A row bound for a visit table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitRow {
    pub responder_name: Option<String>,
    pub submitted: Option<String>,
    pub location: Option<String>,
    pub questionnaire_name: Option<String>,
    pub reason_for_visit: Option<String>,
    pub young_person: Option<String>,
    pub raw_payload: String,
    pub received_at: String,
    #[serde(flatten)]
    pub schema_columns: serde_json::Map<String, serde_json::Value>,
}

/// Per-row failure reported by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowInsertError {
    pub index: u64,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of one webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Nothing,
    Inserted {
        rows_inserted: usize,
        tables_updated: Vec<String>,
    },
    Rejected {
        errors: Vec<(String, Vec<RowInsertError>)>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_payload_last_value_wins_first_position_kept() {
        let payload = FormPayload::from_pairs(vec![("a", "1"), ("b", "2"), ("a", "3")]);

        let pairs: Vec<(&str, &str)> = payload.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_form_payload_equality_respects_order() {
        let ab = FormPayload::from_pairs(vec![("a", "1"), ("b", "2")]);
        let ba = FormPayload::from_pairs(vec![("b", "2"), ("a", "1")]);
        assert_ne!(ab, ba);
        assert_eq!(ab, FormPayload::from_pairs(vec![("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_form_payload_scales_linearly() {
        let started = std::time::Instant::now();
        let payload = FormPayload::from_pairs(
            (0..100_000).map(|i| (format!("field_{}", i), i.to_string())),
        );

        assert_eq!(payload.len(), 100_000);
        assert_eq!(payload.get("field_99999"), Some("99999"));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_table_ref_parse_and_display() {
        let table = TableRef::parse("proj-1.data_set.tbl").unwrap();
        assert_eq!(table.project, "proj-1");
        assert_eq!(table.dataset, "data_set");
        assert_eq!(table.table, "tbl");
        assert_eq!(table.to_string(), "proj-1.data_set.tbl");

        assert!(TableRef::parse("just_a_table").is_err());
    }

    #[test]
    fn test_row_serializes_schema_column_last() {
        let mut schema_columns = serde_json::Map::new();
        schema_columns.insert("age".to_string(), serde_json::Value::Null);
        let row = VisitRow {
            responder_name: Some("Sam".to_string()),
            submitted: None,
            location: None,
            questionnaire_name: None,
            reason_for_visit: None,
            young_person: None,
            raw_payload: "{}".to_string(),
            received_at: "2024-01-01T00:00:00".to_string(),
            schema_columns,
        };

        let json = serde_json::to_value(&row).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.last().map(|k| k.as_str()), Some("age"));
        assert!(json["age"].is_null());
        assert!(json["reason_for_visit"].is_null());
    }
}
