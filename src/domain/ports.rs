use crate::domain::model::{RowInsertError, TableRef, VisitRow};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Destination for visit rows.
///
/// `Ok` carries the per-row errors the warehouse reported (empty when every
/// row landed). `Err` means the request itself failed.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn insert_rows(&self, table: &TableRef, rows: &[VisitRow])
        -> Result<Vec<RowInsertError>>;
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Lists the published versions of a package.
#[async_trait]
pub trait PackageIndex: Send + Sync {
    async fn available_versions(&self, package: &str) -> Result<Vec<String>>;
}
