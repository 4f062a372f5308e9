//! Error types for widget_analytics

use std::io;
use thiserror::Error;

/// Failures surfaced by configuration loading and the persistence adapters.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Malformed or missing configuration; callers fall back to defaults.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or file-system failure while loading, saving or deleting.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The store refused the write or the target is protected.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Stored data could not be parsed into an aggregate.
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// Missing document or file.
    #[error("not found: {0}")]
    NotFound(String),
}

impl AnalyticsError {
    /// Short stable label used to deduplicate operator reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::Configuration(_) => "configuration",
            AnalyticsError::StorageUnavailable(_) => "storage_unavailable",
            AnalyticsError::PermissionDenied(_) => "permission_denied",
            AnalyticsError::MalformedData(_) => "malformed_data",
            AnalyticsError::NotFound(_) => "not_found",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalyticsError::NotFound(_))
    }
}

impl From<io::Error> for AnalyticsError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AnalyticsError::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => AnalyticsError::PermissionDenied(err.to_string()),
            io::ErrorKind::InvalidData => AnalyticsError::MalformedData(err.to_string()),
            _ => AnalyticsError::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(err: serde_json::Error) -> Self {
        AnalyticsError::MalformedData(err.to_string())
    }
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(err: rusqlite::Error) -> Self {
        AnalyticsError::StorageUnavailable(format!("sqlite: {}", err))
    }
}

impl From<reqwest::Error> for AnalyticsError {
    fn from(err: reqwest::Error) -> Self {
        AnalyticsError::StorageUnavailable(format!("http: {}", err))
    }
}

impl From<anyhow::Error> for AnalyticsError {
    fn from(err: anyhow::Error) -> Self {
        AnalyticsError::Configuration(format!("{:#}", err))
    }
}

/// Result type for widget_analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
