#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{BindArgs, CliConfig, Command};
pub use toml_config::{EntryFile, WebhookConfig};
