// Adapters layer: concrete implementations for external systems (warehouse, tokens, package index).

pub mod bigquery;
pub mod index;
pub mod token;

pub use bigquery::BigQuerySink;
pub use index::{HttpIndex, LocalIndex};
pub use token::{MetadataServerToken, StaticToken};
