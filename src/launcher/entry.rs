use crate::utils::error::{IngestError, Result};
use std::fmt;
use std::str::FromStr;

/// `module:attribute` reference to an application object.
///
/// The module names the entry file (`<module>.toml`), the attribute names the
/// top-level table inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRef {
    module: String,
    attribute: String,
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl AppRef {
    pub fn new(module: impl Into<String>, attribute: impl Into<String>) -> Result<Self> {
        let module = module.into();
        let attribute = attribute.into();
        if !is_identifier(&module) || !is_identifier(&attribute) {
            return Err(IngestError::InvalidConfigValueError {
                field: "app".to_string(),
                value: format!("{}:{}", module, attribute),
                reason: "Expected module:attribute made of letters, digits, '_' or '-'"
                    .to_string(),
            });
        }
        Ok(Self { module, attribute })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn entry_file_name(&self) -> String {
        format!("{}.toml", self.module)
    }
}

impl Default for AppRef {
    fn default() -> Self {
        Self {
            module: "main".to_string(),
            attribute: "app".to_string(),
        }
    }
}

impl FromStr for AppRef {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let (module, attribute) =
            s.split_once(':')
                .ok_or_else(|| IngestError::InvalidConfigValueError {
                    field: "app".to_string(),
                    value: s.to_string(),
                    reason: "Expected module:attribute".to_string(),
                })?;
        Self::new(module, attribute)
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}
