//! Pluggable durable stores for the aggregates.
//!
//! Adapters only move documents; applying a loaded document onto an aggregate
//! happens in [`crate::models::Aggregate::merge_document`], under the caller's
//! lock and outside any I/O.

pub mod document_store;
pub mod firestore;
pub mod remote;
pub mod snapshot;
pub mod sqlite_store;
pub mod tabular;

use log::warn;

use super::oplog::OperatorLog;
use crate::error::Result;
use crate::models::{Aggregate, Document, RemoteBackend, Settings};

pub use document_store::DocumentStore;
pub use firestore::{Credentials, FirestoreStore};
pub use remote::{sanitize_keys, RemoteAdapter};
pub use snapshot::SnapshotAdapter;
pub use sqlite_store::SqliteDocumentStore;
pub use tabular::TabularExport;

/// Which stored document a load refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRef<'a> {
    Global,
    Session(&'a str),
}

/// The session half of a save.
#[derive(Debug, Clone, Copy)]
pub struct SessionDocument<'a> {
    pub id: &'a str,
    pub aggregate: &'a Aggregate,
}

pub trait PersistenceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a failed save must be returned to the caller rather than only
    /// reported.
    fn surfaces_save_errors(&self) -> bool {
        false
    }

    /// `Ok(None)` when the adapter has nothing stored for `target`.
    fn load(&self, target: DocumentRef<'_>) -> Result<Option<Document>>;

    fn save(&self, global: &Aggregate, session: Option<SessionDocument<'_>>) -> Result<()>;

    /// Removes one session's stored document. Missing documents are not an error.
    fn delete(&self, session_id: &str) -> Result<()>;
}

/// Ordered set of adapters. Loads apply in order, so later adapters win for
/// the fields they carry.
#[derive(Default)]
pub struct Persistence {
    adapters: Vec<Box<dyn PersistenceAdapter>>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.adapters.iter().map(|a| a.name()))
            .finish()
    }
}

impl Persistence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: impl PersistenceAdapter + 'static) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    pub fn push(&mut self, adapter: Box<dyn PersistenceAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn adapters(&self) -> impl Iterator<Item = &dyn PersistenceAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }

    /// Builds the adapters named in `settings`. An adapter that cannot be
    /// built is reported and left out; tracking continues without it.
    pub fn from_settings(settings: &Settings, oplog: &OperatorLog) -> Self {
        let mut persistence = Self::none();
        let storage = &settings.storage;

        if let Some(path) = &storage.snapshot_path {
            persistence.push(Box::new(SnapshotAdapter::new(path.clone())));
        }
        if let Some(path) = &storage.tabular_path {
            persistence.push(Box::new(TabularExport::new(path.clone())));
        }
        if let Some(remote) = &storage.remote {
            let built: Result<Box<dyn PersistenceAdapter>> = match remote.backend {
                RemoteBackend::Firestore => FirestoreStore::from_settings(remote).map(|store| {
                    Box::new(RemoteAdapter::new(store, &remote.collection, &remote.document_id))
                        as Box<dyn PersistenceAdapter>
                }),
                RemoteBackend::Sqlite => SqliteDocumentStore::from_settings(remote).map(|store| {
                    Box::new(RemoteAdapter::new(store, &remote.collection, &remote.document_id))
                        as Box<dyn PersistenceAdapter>
                }),
            };
            match built {
                Ok(adapter) => persistence.push(adapter),
                Err(e) => {
                    warn!("remote store disabled");
                    oplog.report_failure("remote/init", &e);
                }
            }
        }

        persistence
    }
}
