use crate::adapters::bigquery::DEFAULT_ENDPOINT;
use crate::adapters::token::DEFAULT_METADATA_ENDPOINT;
use crate::config::env::EnvCredentials;
use crate::core::routing::{default_routes, QuestionnaireRoute, RoutingTable};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parsed entry file: a TOML document whose top-level tables declare
/// application objects.
#[derive(Debug, Clone)]
pub struct EntryFile {
    table: toml::Table,
}

impl EntryFile {
    /// 從 TOML 檔案載入
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IngestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析, 並替換字串值中的 `${VAR}`
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table =
            toml::from_str(content).map_err(|e| IngestError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IngestError::ConfigError {
            message: e.to_string(),
        })?;
        for (_, value) in table.iter_mut() {
            substitute_env_vars(&re, value);
        }

        Ok(Self { table })
    }

    pub fn attribute(&self, name: &str) -> Option<&toml::Value> {
        self.table.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

/// Unset variables are left as `${VAR}` so validation can name them.
fn substitute_env_vars(re: &Regex, value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => {
            if s.contains("${") {
                let replaced = re.replace_all(s, |caps: &regex::Captures| {
                    let var_name = &caps[1];
                    std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
                });
                *s = replaced.into_owned();
            }
        }
        toml::Value::Array(items) => {
            for item in items {
                substitute_env_vars(re, item);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_env_vars(re, item);
            }
        }
        _ => {}
    }
}

fn default_path() -> String {
    "/webhook/visitor".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_metadata_endpoint() -> String {
    DEFAULT_METADATA_ENDPOINT.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// `kind = "visitor-webhook"` application table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    pub kind: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default = "default_routes")]
    pub questionnaires: Vec<QuestionnaireRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    #[default]
    Metadata,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub token: TokenSource,
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: TokenSource::default(),
            access_token: None,
            metadata_endpoint: default_metadata_endpoint(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl WebhookConfig {
    pub fn from_value(value: toml::Value) -> Result<Self> {
        value
            .try_into()
            .map_err(|e: toml::de::Error| IngestError::ConfigValidationError {
                field: "app".to_string(),
                message: e.message().to_string(),
            })
    }

    /// Credentials from `[app.auth]`, falling back to the environment.
    pub fn credentials(&self) -> Result<AuthConfig> {
        let auth = match &self.auth {
            Some(auth) => auth.clone(),
            None => {
                let env = EnvCredentials::from_env()?;
                AuthConfig {
                    username: env.username,
                    password: env.password,
                }
            }
        };

        validation::validate_resolved("auth.username", &auth.username)?;
        validation::validate_resolved("auth.password", &auth.password)?;
        validation::validate_non_empty_string("auth.username", &auth.username)?;
        validation::validate_non_empty_string("auth.password", &auth.password)?;
        Ok(auth)
    }

    pub fn routing_table(&self) -> Result<RoutingTable> {
        RoutingTable::new(&self.questionnaires)
    }
}

impl Validate for WebhookConfig {
    fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(IngestError::InvalidConfigValueError {
                field: "path".to_string(),
                value: self.path.clone(),
                reason: "Route path must start with '/'".to_string(),
            });
        }
        validation::validate_range("max_body_bytes", self.max_body_bytes, 1024, 64 * 1024 * 1024)?;
        self.warehouse.validate()?;

        if self.questionnaires.is_empty() {
            return Err(IngestError::MissingConfigError {
                field: "questionnaires".to_string(),
            });
        }
        self.routing_table()?;

        tracing::debug!("✅ Webhook configuration validation passed");
        Ok(())
    }
}

impl Validate for WarehouseConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("warehouse.endpoint", &self.endpoint)?;
        validation::validate_range("warehouse.timeout_seconds", self.timeout_seconds, 1, 300)?;

        match self.token {
            TokenSource::Metadata => {
                validation::validate_url("warehouse.metadata_endpoint", &self.metadata_endpoint)
            }
            TokenSource::Static => {
                let token =
                    validation::validate_required_field("warehouse.access_token", &self.access_token)?;
                validation::validate_resolved("warehouse.access_token", token)?;
                validation::validate_non_empty_string("warehouse.access_token", token)
            }
        }
    }
}
