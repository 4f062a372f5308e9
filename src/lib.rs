//! Usage telemetry for rerun-driven widget apps.
//!
//! Wrap the host's widget calls in a [`Tracker`] and every genuine interaction
//! is counted once, globally and per session, in day buckets. Reruns that hand
//! back a widget's retained value are not counted again.

pub mod core;
pub mod error;
pub mod models;

pub use crate::core::config::{load_settings, save_settings, DEFAULT_CONFIG_PATH};
pub use crate::core::persistence::{
    DocumentStore, FirestoreStore, Persistence, PersistenceAdapter, RemoteAdapter, SnapshotAdapter,
    SqliteDocumentStore, TabularExport,
};
pub use crate::core::{
    Analytics, Interceptor, InterceptorTable, OperatorLog, SessionContext, SharedAggregate,
    Tracker, TrackingState, WidgetHost,
};
pub use error::{AnalyticsError, Result};
pub use models::{
    Aggregate, DayBucket, OperationKind, RemoteBackend, RemoteSettings, Settings, StorageSettings,
    WidgetKey, WidgetStat, WidgetValue,
};
