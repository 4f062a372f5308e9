use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::date_key;
use crate::error::Result;
use crate::models::{Aggregate, Document, WidgetKey, WidgetShape};

/// The process-wide aggregate shared by every concurrent session.
///
/// Each call takes the lock for exactly one mutation; nothing here blocks on I/O.
#[derive(Debug, Clone, Default)]
pub struct SharedAggregate {
    inner: Arc<Mutex<Aggregate>>,
}

impl SharedAggregate {
    pub fn new(aggregate: Aggregate) -> Self {
        Self {
            inner: Arc::new(Mutex::new(aggregate)),
        }
    }

    pub fn snapshot(&self) -> Aggregate {
        self.inner.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Aggregate) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn ensure_widget(&self, key: &WidgetKey, shape: WidgetShape, options: &[&str]) -> bool {
        self.inner.lock().ensure_widget(key, shape, options)
    }

    pub fn record_interaction(&self, key: &WidgetKey, value: Option<&str>) -> bool {
        let today = date_key::today();
        self.inner.lock().record_interaction_on(today, key, value)
    }

    pub fn record_render(&self, script_runs: u64, pageviews: u64) {
        let today = date_key::today();
        self.inner.lock().record_render_on(today, script_runs, pageviews);
    }

    pub fn record_active_time(&self, seconds: f64) {
        let today = date_key::today();
        self.inner.lock().record_active_time_on(today, seconds);
    }

    /// Replaces the aggregate with a fresh one. The loaded flag survives so a
    /// reset store is not refilled from the stale stored copy.
    pub fn reset(&self) {
        let fresh = Aggregate::fresh_on(Utc::now(), date_key::today());
        let mut guard = self.inner.lock();
        let loaded = guard.loaded_from_remote;
        *guard = fresh;
        guard.loaded_from_remote = loaded;
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().loaded_from_remote
    }

    pub fn mark_loaded(&self) {
        self.inner.lock().loaded_from_remote = true;
    }

    pub fn merge_document(&self, doc: &Document) -> Result<()> {
        self.inner.lock().merge_document(doc)
    }
}
