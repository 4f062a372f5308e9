use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{DocumentRef, PersistenceAdapter, SessionDocument};
use crate::error::{AnalyticsError, Result};
use crate::models::{Aggregate, Document};

const CURRENT_SNAPSHOT_VERSION: u32 = 1;

fn default_snapshot_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSnapshot {
    #[serde(default = "default_snapshot_version")]
    version: u32,
    counts: Document,
}

/// Whole-file JSON snapshot of the global aggregate.
///
/// `save` overwrites the file atomically; `load` hands back only the fields
/// present in the file, so anything missing keeps its in-memory value.
/// Concurrent saves are serialized and a reader always sees a complete file.
#[derive(Debug)]
pub struct SnapshotAdapter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceAdapter for SnapshotAdapter {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn surfaces_save_errors(&self) -> bool {
        true
    }

    fn load(&self, target: DocumentRef<'_>) -> Result<Option<Document>> {
        if target != DocumentRef::Global {
            return Ok(None);
        }
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let raw: Value = serde_json::from_slice(&bytes)?;
        let Value::Object(mut map) = raw else {
            return Err(AnalyticsError::MalformedData(format!(
                "{} is not a JSON object",
                self.path.display()
            )));
        };

        // Older exports are a bare aggregate object without the envelope.
        if !map.contains_key("counts") {
            return Ok(Some(map));
        }

        let version = map
            .get("version")
            .and_then(Value::as_u64)
            .unwrap_or(u64::from(default_snapshot_version()));
        if version > u64::from(CURRENT_SNAPSHOT_VERSION) {
            warn!(
                "snapshot {} has version {}, newer than {}; loading known fields only",
                self.path.display(),
                version,
                CURRENT_SNAPSHOT_VERSION
            );
        }
        match map.remove("counts") {
            Some(Value::Object(counts)) => Ok(Some(counts)),
            _ => Err(AnalyticsError::MalformedData(format!(
                "{}: `counts` is not an object",
                self.path.display()
            ))),
        }
    }

    fn save(&self, global: &Aggregate, _session: Option<SessionDocument<'_>>) -> Result<()> {
        let snapshot = PersistedSnapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            counts: global.to_document()?,
        };
        let _guard = self.write_lock.lock();
        write_snapshot_atomically(&self.path, &snapshot)?;
        Ok(())
    }

    fn delete(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes into a uniquely named sibling temp file, then renames it over
/// `path`, so the old snapshot stays in place until the new one is complete.
pub(crate) fn write_atomically(
    path: &Path,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn write_snapshot_atomically(path: &Path, snapshot: &PersistedSnapshot) -> io::Result<()> {
    write_atomically(path, |file| {
        serde_json::to_writer_pretty(&mut *file, snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        file.write_all(b"\n")
    })
}
