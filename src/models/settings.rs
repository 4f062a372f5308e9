use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::widget::OperationKind;

pub const DEFAULT_DOCUMENT_ID: &str = "counts";
pub const DEFAULT_COLLECTION: &str = "widget-analytics";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub tracked_operations: Vec<OperationKind>,
    pub log_dir: Option<PathBuf>,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            tracked_operations: OperationKind::ALL.to_vec(),
            log_dir: None,
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// JSON snapshot of the global aggregate.
    pub snapshot_path: Option<PathBuf>,
    /// CSV export, one row per day.
    pub tabular_path: Option<PathBuf>,
    pub remote: Option<RemoteSettings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBackend {
    #[default]
    Firestore,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub backend: RemoteBackend,
    pub collection: String,
    pub document_id: String,
    pub project: Option<String>,
    /// Service-account key file.
    pub key_file: Option<PathBuf>,
    /// Environment variable holding an injected service-account blob
    /// (raw JSON or base64 of it).
    pub credentials_env: Option<String>,
    /// Base URL override, e.g. a local emulator.
    pub endpoint: Option<String>,
    pub sqlite_path: Option<PathBuf>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            backend: RemoteBackend::Firestore,
            collection: DEFAULT_COLLECTION.to_string(),
            document_id: DEFAULT_DOCUMENT_ID.to_string(),
            project: None,
            key_file: None,
            credentials_env: None,
            endpoint: None,
            sqlite_path: None,
        }
    }
}
