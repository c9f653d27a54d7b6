pub mod ingest;
pub mod payload;
pub mod routing;
pub mod submission;

pub use crate::domain::model::{FormPayload, IngestOutcome, Submission, VisitRow};
pub use crate::domain::ports::{PackageIndex, RowSink, TokenProvider};
pub use crate::utils::error::Result;
