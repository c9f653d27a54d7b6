use crate::utils::error::{IngestError, Result};
use std::env;

pub const USER_VAR: &str = "BASIC_AUTH_USER";
pub const PASS_VAR: &str = "BASIC_AUTH_PASS";

/// Webhook credentials taken from the process environment.
#[derive(Clone)]
pub struct EnvCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl EnvCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            username: env::var(USER_VAR).map_err(|_| IngestError::MissingConfigError {
                field: USER_VAR.to_string(),
            })?,
            password: env::var(PASS_VAR).map_err(|_| IngestError::MissingConfigError {
                field: PASS_VAR.to_string(),
            })?,
        })
    }
}
