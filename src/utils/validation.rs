use crate::utils::error::{IngestError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> IngestError {
    IngestError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| IngestError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be blank"));
    }
    Ok(())
}

/// 檢查 `${VAR}` 是否在環境變數替換後仍殘留
pub fn validate_resolved(field_name: &str, value: &str) -> Result<()> {
    if value.contains("${") {
        return Err(invalid(
            field_name,
            value,
            "Unresolved environment variable placeholder",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Must lie in {}..={}", min, max),
        ));
    }
    Ok(())
}

/// Fully-qualified warehouse table: `project.dataset.table`.
pub fn validate_table_id(field_name: &str, table_id: &str) -> Result<()> {
    let parts: Vec<&str> = table_id.split('.').collect();
    let well_formed = parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });

    if !well_formed {
        return Err(invalid(field_name, table_id, "Expected project.dataset.table"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("warehouse.endpoint", "https://example.com").is_ok());
        assert!(validate_url("warehouse.endpoint", "http://127.0.0.1:9000").is_ok());
        assert!(validate_url("warehouse.endpoint", "").is_err());
        assert!(validate_url("warehouse.endpoint", "invalid-url").is_err());
        assert!(validate_url("warehouse.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_table_id() {
        assert!(validate_table_id(
            "table",
            "city-of-swan-youth-centres.every_visit_data.every_visit"
        )
        .is_ok());
        assert!(validate_table_id("table", "dataset.table").is_err());
        assert!(validate_table_id("table", "a..b").is_err());
        assert!(validate_table_id("table", "a.b.c d").is_err());
    }

    #[test]
    fn test_validate_resolved() {
        assert!(validate_resolved("auth.username", "admin").is_ok());
        assert!(validate_resolved("auth.username", "${BASIC_AUTH_USER}").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("timeout_seconds", 30, 1, 300).is_ok());
        assert!(validate_range("timeout_seconds", 0, 1, 300).is_err());
    }
}
