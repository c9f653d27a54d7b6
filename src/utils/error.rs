use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed at {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Warehouse insert into {table} failed: {message}")]
    WarehouseError { table: String, message: String },

    #[error("Access token error: {message}")]
    TokenError { message: String },

    #[error("Cannot resolve dependency {package} ({constraint}): {reason}")]
    DependencyResolutionError {
        package: String,
        constraint: String,
        reason: String,
    },

    #[error("Entry file not found: {path}")]
    MissingEntryFileError { path: String },

    #[error("Invalid image at {path}: {message}")]
    InvalidImageError { path: String, message: String },

    #[error("Cannot bind {addr}: {source}")]
    BindError {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load application {app_ref}: {reason}")]
    ApplicationLoadError { app_ref: String, reason: String },

    #[error("Server error: {message}")]
    ServerError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Build,
    Startup,
    Network,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::ConfigError { .. }
            | IngestError::MissingConfigError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            IngestError::DependencyResolutionError { .. }
            | IngestError::MissingEntryFileError { .. } => ErrorCategory::Build,
            IngestError::InvalidImageError { .. }
            | IngestError::BindError { .. }
            | IngestError::ApplicationLoadError { .. } => ErrorCategory::Startup,
            IngestError::ApiError(_)
            | IngestError::WarehouseError { .. }
            | IngestError::TokenError { .. } => ErrorCategory::Network,
            IngestError::SerializationError(_)
            | IngestError::ProcessingError { .. } => ErrorCategory::Data,
            IngestError::IoError(_) | IngestError::ServerError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Build => ErrorSeverity::High,
            ErrorCategory::Startup | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 根據嚴重程度決定的程序退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            IngestError::MissingConfigError { field } => {
                format!("Set `{}` in the entry file or the environment", field)
            }
            IngestError::InvalidConfigValueError { field, .. }
            | IngestError::ConfigValidationError { field, .. } => {
                format!("Check the value of `{}`", field)
            }
            IngestError::ConfigError { .. } => "Check the entry file syntax".to_string(),
            IngestError::DependencyResolutionError { package, .. } => format!(
                "Relax the constraint for `{}` or check that the package index is reachable",
                package
            ),
            IngestError::MissingEntryFileError { path } => {
                format!("Add {} to the build context", path)
            }
            IngestError::InvalidImageError { .. } => {
                "Run the build step again to produce a fresh image".to_string()
            }
            IngestError::BindError { addr, .. } => {
                format!("Stop the process holding {} or choose another port", addr)
            }
            IngestError::ApplicationLoadError { .. } => {
                "Make sure the entry file declares the application table with a known `kind`"
                    .to_string()
            }
            IngestError::ApiError(_) | IngestError::WarehouseError { .. } => {
                "Check network connectivity and warehouse permissions".to_string()
            }
            IngestError::TokenError { .. } => {
                "Check the service account attached to the runtime".to_string()
            }
            IngestError::IoError(_) => "Check file permissions and paths".to_string(),
            IngestError::SerializationError(_) | IngestError::ProcessingError { .. } => {
                "Inspect the payload that triggered the error".to_string()
            }
            IngestError::ServerError { .. } => "Check the server logs".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Build => format!("Build failed: {}", self),
            ErrorCategory::Startup => format!("Start failed: {}", self),
            ErrorCategory::Network => format!("Upstream service problem: {}", self),
            ErrorCategory::Data => format!("Could not process data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
