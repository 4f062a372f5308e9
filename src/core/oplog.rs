//! Operator-facing failure log.
//!
//! Persistence failures never abort the tracked app; they land here once and
//! are otherwise swallowed. Records are JSON lines with size-based rotation.

use chrono::Utc;
use log::{error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::error::{AnalyticsError, Result};

const LOG_FILE_NAME: &str = "analytics.log.jsonl";
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
const MAX_ROTATIONS: usize = 3;
const DEFAULT_TAIL_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub ts_ms: i64,
    pub level: String,
    pub scope: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Default)]
pub struct OperatorLog {
    dir: Option<PathBuf>,
    file_lock: Mutex<()>,
    reported: Mutex<HashSet<(String, &'static str)>>,
}

impl OperatorLog {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            file_lock: Mutex::new(()),
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Reports a failure the first time `scope` fails with this error kind.
    /// Returns whether a report was written.
    pub fn report_failure(&self, scope: &str, err: &AnalyticsError) -> bool {
        let first = self
            .reported
            .lock()
            .insert((scope.to_string(), err.kind()));
        if !first {
            return false;
        }

        error!("{}: {}", scope, err);
        let record = OperatorRecord {
            ts_ms: Utc::now().timestamp_millis(),
            level: "error".to_string(),
            scope: scope.to_string(),
            message: err.to_string(),
            data: Some(serde_json::json!({ "kind": err.kind() })),
        };
        if let Err(e) = self.append(record) {
            error!("operator log write failed: {}", e);
        }
        true
    }

    /// Clears the dedup state for `scope` after it succeeded again.
    pub fn resolve(&self, scope: &str) {
        let mut reported = self.reported.lock();
        let before = reported.len();
        reported.retain(|(s, _)| s != scope);
        if reported.len() != before {
            info!("{}: recovered", scope);
        }
    }

    pub fn append(&self, record: OperatorRecord) -> Result<()> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(());
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let _guard = self.file_lock.lock();
        fs::create_dir_all(dir)?;
        let current = segment_path(dir, 0);
        if fs::metadata(&current).map_or(false, |m| m.len() >= MAX_LOG_BYTES) {
            shift_segments(dir)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current)?
            .write_all(&line)?;
        Ok(())
    }

    /// Most recent records, oldest first, optionally filtered by a
    /// case-insensitive substring of level, scope or message.
    pub fn read(&self, limit: usize, query: Option<&str>) -> Result<Vec<OperatorRecord>> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(Vec::new());
        };
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let matches = |rec: &OperatorRecord| match &needle {
            Some(needle) => [&rec.level, &rec.scope, &rec.message]
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
            None => true,
        };

        let _guard = self.file_lock.lock();
        let mut kept: VecDeque<OperatorRecord> = VecDeque::with_capacity(limit.min(256));
        for index in (0..=MAX_ROTATIONS).rev() {
            for line in tail_lines(&segment_path(dir, index), DEFAULT_TAIL_BYTES)? {
                let Ok(rec) = serde_json::from_str::<OperatorRecord>(&line) else {
                    continue;
                };
                if !matches(&rec) {
                    continue;
                }
                if kept.len() == limit {
                    kept.pop_front();
                }
                if limit > 0 {
                    kept.push_back(rec);
                }
            }
        }
        Ok(kept.into())
    }

    /// Removes the current log and every rotated segment.
    pub fn clear(&self) -> Result<()> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(());
        };
        let _guard = self.file_lock.lock();
        (0..=MAX_ROTATIONS).try_for_each(|index| remove_if_present(&segment_path(dir, index)))
    }
}

/// Segment 0 is the live file; 1..=MAX_ROTATIONS are older, highest oldest.
fn segment_path(dir: &Path, index: usize) -> PathBuf {
    match index {
        0 => dir.join(LOG_FILE_NAME),
        n => dir.join(format!("analytics.log.{}.jsonl", n)),
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Drops the oldest segment and moves every other one up by one.
fn shift_segments(dir: &Path) -> Result<()> {
    remove_if_present(&segment_path(dir, MAX_ROTATIONS))?;
    for index in (0..MAX_ROTATIONS).rev() {
        match fs::rename(segment_path(dir, index), segment_path(dir, index + 1)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }
    Ok(())
}

/// Complete lines within the last `max_bytes` of `path`. A missing file has
/// no lines.
fn tail_lines(path: &Path, max_bytes: u64) -> Result<Vec<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let offset = file.metadata()?.len().saturating_sub(max_bytes);
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;
    if offset > 0 {
        // Partial first line.
        reader.read_until(b'\n', &mut Vec::new())?;
    }
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_reported_once_until_resolved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = OperatorLog::new(Some(dir.path().to_path_buf()));
        let err = AnalyticsError::StorageUnavailable("offline".into());

        assert!(log.report_failure("remote/save", &err));
        assert!(!log.report_failure("remote/save", &err));
        assert!(log.report_failure("remote/load", &err));

        log.resolve("remote/save");
        assert!(log.report_failure("remote/save", &err));

        let records = log.read(10, None).expect("read");
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.level == "error"));

        let filtered = log.read(10, Some("LOAD")).expect("read");
        assert_eq!(filtered.len(), 1);

        log.clear().expect("clear");
        assert!(log.read(10, None).expect("read").is_empty());
    }

    #[test]
    fn shifting_keeps_a_bounded_number_of_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        for round in 0..=MAX_ROTATIONS + 1 {
            fs::write(segment_path(dir.path(), 0), format!("round {}\n", round)).expect("write");
            shift_segments(dir.path()).expect("shift");
        }

        assert!(!segment_path(dir.path(), 0).exists());
        for index in 1..=MAX_ROTATIONS {
            let body = fs::read_to_string(segment_path(dir.path(), index)).expect("segment");
            assert_eq!(body, format!("round {}\n", MAX_ROTATIONS + 2 - index));
        }
        assert!(!segment_path(dir.path(), MAX_ROTATIONS + 1).exists());
    }

    #[test]
    fn tail_skips_the_partial_first_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tail.jsonl");
        fs::write(&path, "first line\nsecond\nthird\n").expect("write");

        assert_eq!(tail_lines(&path, 13).expect("tail"), vec!["third"]);
        assert_eq!(tail_lines(&path, 1024).expect("tail").len(), 3);
        assert!(tail_lines(&dir.path().join("missing"), 10).expect("tail").is_empty());
    }

    #[test]
    fn without_dir_nothing_is_written() {
        let log = OperatorLog::new(None);
        assert!(log.report_failure("snapshot/save", &AnalyticsError::NotFound("x".into())));
        assert!(log.read(10, None).expect("read").is_empty());
    }
}
