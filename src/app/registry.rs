use crate::app::server;
use crate::config::toml_config::EntryFile;
use crate::launcher::entry::AppRef;
use crate::utils::error::{IngestError, Result};
use axum::Router;
use std::collections::BTreeMap;
use std::path::Path;

/// Builds a router from the application's table in the entry file.
pub type AppFactory = fn(toml::Value) -> Result<Router>;

/// Known application kinds.
#[derive(Clone)]
pub struct AppRegistry {
    factories: BTreeMap<String, AppFactory>,
}

impl AppRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: AppFactory) -> &mut Self {
        self.factories.insert(kind.into(), factory);
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Loads the application object `app_ref` names from `entry_path`.
    pub fn load(&self, app_ref: &AppRef, entry_path: &Path) -> Result<Router> {
        let fail = |reason: String| IngestError::ApplicationLoadError {
            app_ref: app_ref.to_string(),
            reason,
        };

        if !entry_path.is_file() {
            return Err(fail(format!(
                "entry file {} not found",
                entry_path.display()
            )));
        }
        let entry = EntryFile::from_file(entry_path).map_err(|e| fail(e.to_string()))?;

        let value = entry.attribute(app_ref.attribute()).ok_or_else(|| {
            fail(format!(
                "module `{}` has no attribute `{}` (defined: {})",
                app_ref.module(),
                app_ref.attribute(),
                entry.attributes().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let kind = value
            .as_table()
            .and_then(|table| table.get("kind"))
            .and_then(|kind| kind.as_str())
            .ok_or_else(|| {
                fail(format!(
                    "`{}` is not an application table with a `kind`",
                    app_ref.attribute()
                ))
            })?;

        let factory = self.factories.get(kind).ok_or_else(|| {
            fail(format!(
                "unknown application kind `{}` (known: {})",
                kind,
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let router = factory(value.clone()).map_err(|e| fail(e.to_string()))?;
        tracing::info!(app = %app_ref, kind, "✅ Application loaded");
        Ok(router)
    }
}

impl Default for AppRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(server::KIND, server::factory);
        registry
    }
}
