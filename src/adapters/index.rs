use crate::domain::ports::PackageIndex;
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Canonical package name: lowercase, with runs of `-`, `_` and `.` folded to `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
            }
            in_separator = true;
        } else {
            normalized.push(ch.to_ascii_lowercase());
            in_separator = false;
        }
    }
    normalized
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    packages: HashMap<String, Vec<String>>,
}

/// Offline index read from a TOML file:
///
/// ```toml
/// [packages]
/// hyper = ["0.110.0", "0.111.0"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    packages: HashMap<String, Vec<String>>,
}

impl LocalIndex {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: IndexFile =
            toml::from_str(content).map_err(|e| IngestError::ConfigValidationError {
                field: "packages".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        Ok(Self {
            packages: file
                .packages
                .into_iter()
                .map(|(name, versions)| (normalize_name(&name), versions))
                .collect(),
        })
    }
}

#[async_trait]
impl PackageIndex for LocalIndex {
    async fn available_versions(&self, package: &str) -> Result<Vec<String>> {
        Ok(self
            .packages
            .get(&normalize_name(package))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    #[serde(default)]
    releases: HashMap<String, serde_json::Value>,
}

/// JSON index answering `GET {base}/{name}/json` with a `releases` object.
pub struct HttpIndex {
    client: Client,
    base_url: String,
}

impl HttpIndex {
    pub fn new(client: Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        crate::utils::validation::validate_url("index", &base_url)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PackageIndex for HttpIndex {
    async fn available_versions(&self, package: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}/json", self.base_url, normalize_name(package));
        tracing::debug!(%url, "Querying package index");

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = response.error_for_status()?;

        let document: ProjectDocument = response.json().await?;
        Ok(document.releases.into_keys().collect())
    }
}
