use std::fmt;

use serde::Serialize;

/// Structured error type for everything around the compiler: loading the
/// registry and configuration, and talking to the documentation build.
/// Errors in VU text itself are [`crate::dsl::error::CompileError`]s and
/// are reported per VU instead.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    NotFound { what: String },
    IoError { message: String },
    RegistryError { message: String },
    ConfigError { message: String },
    ProtocolError { message: String },
    ValidationError { message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound { what } => write!(f, "{what} not found"),
            AppError::IoError { message } => write!(f, "I/O error: {message}"),
            AppError::RegistryError { message } => write!(f, "Registry error: {message}"),
            AppError::ConfigError { message } => write!(f, "Config error: {message}"),
            AppError::ProtocolError { message } => write!(f, "Internal error: {message}"),
            AppError::ValidationError { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(e: quick_xml::Error) -> Self {
        AppError::RegistryError {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::ConfigError {
            message: e.to_string(),
        }
    }
}

impl From<AppError> for String {
    fn from(e: AppError) -> String {
        e.to_string()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::ValidationError { message: s }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::ValidationError {
            message: s.to_string(),
        }
    }
}
