use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::snapshot::write_atomically;
use super::{DocumentRef, PersistenceAdapter, SessionDocument};
use crate::error::Result;
use crate::models::{Aggregate, Document, WidgetKey};

const FIXED_COLUMNS: [&str; 4] = ["date", "pageviews", "script_runs", "session_time_seconds"];

/// Write-only CSV export of the global aggregate, one row per day bucket.
#[derive(Debug)]
pub struct TabularExport {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TabularExport {
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

/// Renders `aggregate` as CSV. Widget columns are every key seen top-level or
/// in any day, sorted; each cell is that widget's total for the day.
pub fn render_csv(aggregate: &Aggregate) -> String {
    let mut keys: BTreeSet<&WidgetKey> = aggregate.widgets.keys().collect();
    for bucket in &aggregate.per_day {
        keys.extend(bucket.widgets.keys());
    }

    let mut out = String::new();
    let header: Vec<String> = FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(keys.iter().map(|k| escape_field(k.as_str())))
        .collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for bucket in &aggregate.per_day {
        let mut row = vec![
            bucket.date.to_string(),
            bucket.pageviews.to_string(),
            bucket.script_runs.to_string(),
            format!("{}", bucket.active_seconds),
        ];
        row.extend(keys.iter().map(|k| bucket.widget_total(k.as_str()).to_string()));
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn escape_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

impl PersistenceAdapter for TabularExport {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn load(&self, _target: DocumentRef<'_>) -> Result<Option<Document>> {
        Ok(None)
    }

    fn save(&self, global: &Aggregate, _session: Option<SessionDocument<'_>>) -> Result<()> {
        let body = render_csv(global);
        let _guard = self.write_lock.lock();
        write_atomically(&self.path, |file| file.write_all(body.as_bytes()))?;
        Ok(())
    }

    fn delete(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}
