use log::{error, info, warn};
use std::fs;
use std::path::Path;

use crate::error::{AnalyticsError, Result};
use crate::models::Settings;

pub const DEFAULT_CONFIG_PATH: &str = ".analytics/analytics.toml";

/// Loads settings, falling back to the built-in defaults when the file is
/// missing or unreadable. Never fails.
pub fn load_settings(path: &Path) -> Settings {
    match try_load_settings(path) {
        Ok(settings) => settings,
        Err(AnalyticsError::NotFound(_)) => {
            warn!("config {} not found; using defaults", path.display());
            Settings::default()
        }
        Err(e) => {
            error!("{}; using defaults", e);
            Settings::default()
        }
    }
}

pub fn try_load_settings(path: &Path) -> Result<Settings> {
    info!("loading analytics config from {}", path.display());
    let content = fs::read_to_string(path)?;
    toml::from_str::<Settings>(&content)
        .map_err(|e| AnalyticsError::Configuration(format!("{}: {}", path.display(), e)))
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(settings)
        .map_err(|e| AnalyticsError::Configuration(e.to_string()))?;
    fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OperationKind, RemoteBackend};

    #[test]
    fn missing_and_malformed_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        assert_eq!(load_settings(&missing), Settings::default());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "enabled = [not toml").expect("write");
        assert_eq!(load_settings(&bad), Settings::default());
        assert_eq!(
            try_load_settings(&bad).expect_err("malformed").kind(),
            "configuration"
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("analytics.toml");
        fs::write(
            &path,
            r#"
tracked_operations = ["trigger", "select_one"]

[storage]
snapshot_path = "counts.json"

[storage.remote]
backend = "sqlite"
collection = "app-usage"
"#,
        )
        .expect("write");

        let settings = load_settings(&path);
        assert!(settings.enabled);
        assert_eq!(
            settings.tracked_operations,
            vec![OperationKind::Trigger, OperationKind::SelectOne]
        );
        let remote = settings.storage.remote.expect("remote");
        assert_eq!(remote.backend, RemoteBackend::Sqlite);
        assert_eq!(remote.collection, "app-usage");
        assert_eq!(remote.document_id, "counts");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("analytics.toml");
        let mut settings = Settings::default();
        settings.enabled = false;
        settings.storage.tabular_path = Some("daily.csv".into());

        save_settings(&path, &settings).expect("save");
        assert_eq!(try_load_settings(&path).expect("load"), settings);
    }
}
