pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod launcher;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::AppRegistry;
pub use core::ingest::IngestEngine;
pub use launcher::Launcher;
pub use utils::error::{IngestError, Result};
