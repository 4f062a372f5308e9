//! Tracking lifecycle: `Inactive -> Active -> Inactive` per session.
//!
//! [`Analytics`] owns everything shared between sessions. A [`Tracker`] is the
//! active half of one session; it wraps the host's widget calls and flushes
//! through the persistence adapters when stopped or dropped.

use log::{debug, error, info};
use parking_lot::Mutex;
use std::path::Path;
use std::time::Instant;

use super::config;
use super::host::WidgetHost;
use super::oplog::OperatorLog;
use super::persistence::{DocumentRef, Persistence, SessionDocument};
use super::proxy::{Interaction, Interceptor, InterceptorTable, Observation};
use super::session::{SessionContext, TrackingState};
use super::store::SharedAggregate;
use crate::error::{AnalyticsError, Result};
use crate::models::{Aggregate, OperationKind, Settings, WidgetKey, WidgetValue};

pub struct Analytics {
    settings: Settings,
    global: SharedAggregate,
    table: InterceptorTable,
    persistence: Persistence,
    oplog: OperatorLog,
    load_lock: Mutex<()>,
    save_lock: Mutex<()>,
}

impl Analytics {
    /// Builds the engine with the adapters named in `settings`.
    pub fn new(settings: Settings) -> Self {
        let oplog = OperatorLog::new(settings.log_dir.clone());
        let persistence = Persistence::from_settings(&settings, &oplog);
        Self::assemble(settings, persistence, oplog)
    }

    pub fn from_config_file(path: &Path) -> Self {
        Self::new(config::load_settings(path))
    }

    pub fn with_persistence(settings: Settings, persistence: Persistence) -> Self {
        let oplog = OperatorLog::new(settings.log_dir.clone());
        Self::assemble(settings, persistence, oplog)
    }

    fn assemble(settings: Settings, persistence: Persistence, oplog: OperatorLog) -> Self {
        let table = InterceptorTable::with_defaults(&settings.tracked_operations);
        info!(
            "analytics ready: enabled={}, operations={:?}, adapters={:?}",
            settings.enabled, table, persistence
        );
        Self {
            settings,
            global: SharedAggregate::default(),
            table,
            persistence,
            oplog,
            load_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn global(&self) -> &SharedAggregate {
        &self.global
    }

    /// Copy of the global aggregate.
    pub fn counts(&self) -> Aggregate {
        self.global.snapshot()
    }

    pub fn oplog(&self) -> &OperatorLog {
        &self.oplog
    }

    pub fn interceptors(&self) -> &InterceptorTable {
        &self.table
    }

    /// Replaces the interceptor for `kind`. Sessions pick it up on their next
    /// `start_tracking`.
    pub fn register_interceptor(&mut self, kind: OperationKind, interceptor: Interceptor) {
        self.table.register(kind, interceptor);
    }

    /// Starts tracking `session` and returns the wrapped host.
    ///
    /// When the session is already active, or tracking is disabled, the
    /// returned tracker only passes calls through and never stops anything.
    pub fn start_tracking<'a, H: WidgetHost>(
        &'a self,
        session: &'a mut SessionContext,
        host: H,
    ) -> Tracker<'a, H> {
        let owns = if !self.settings.enabled {
            false
        } else if session.is_active() {
            debug!("start_tracking on an active session; ignored");
            false
        } else {
            self.activate(session);
            true
        };
        Tracker {
            analytics: self,
            session,
            host,
            owns,
            stopped: false,
        }
    }

    /// Runs `body` between `start_tracking` and `stop`. The stop also runs
    /// when `body` panics.
    pub fn track<H, R>(
        &self,
        session: &mut SessionContext,
        host: H,
        body: impl FnOnce(&mut Tracker<'_, H>) -> R,
    ) -> Result<R>
    where
        H: WidgetHost,
    {
        let mut tracker = self.start_tracking(session, host);
        let out = body(&mut tracker);
        tracker.stop()?;
        Ok(out)
    }

    /// Removes one session's stored document from every adapter. The global
    /// aggregate, in memory and stored, is left alone.
    pub fn delete_session_data(&self, session_id: &str) -> Result<()> {
        let mut first_err = None;
        for adapter in self.persistence.adapters() {
            let scope = format!("{}/delete", adapter.name());
            match adapter.delete(session_id) {
                Ok(()) => self.oplog.resolve(&scope),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    self.oplog.report_failure(&scope, &e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                info!("deleted stored data for session {}", session_id);
                Ok(())
            }
        }
    }

    /// Zeroes the global aggregate, and `session`'s when given, then saves.
    pub fn reset(&self, mut session: Option<&mut SessionContext>) -> Result<()> {
        self.global.reset();
        if let Some(s) = session.as_deref_mut() {
            s.reset();
        }
        info!("analytics counters reset");
        self.save(session.as_deref())
    }

    fn activate(&self, session: &mut SessionContext) {
        self.load_global();
        if !session.aggregate.loaded_from_remote {
            self.load_session(session);
        }

        let pageviews = if session.pageview_recorded { 0 } else { 1 };
        session.pageview_recorded = true;
        self.global.record_render(1, pageviews);
        session.aggregate.record_render(1, pageviews);

        session.installed = self.table.clone();
        session.activated_at = Some(Instant::now());
        session.state = TrackingState::Active;
    }

    fn deactivate(&self, session: &mut SessionContext) -> Result<()> {
        if let Some(started) = session.activated_at.take() {
            let seconds = started.elapsed().as_secs_f64();
            self.global.record_active_time(seconds);
            session.aggregate.record_active_time(seconds);
        }
        let saved = self.save(Some(&*session));
        session.installed.clear();
        session.state = TrackingState::Inactive;
        saved
    }

    fn load_global(&self) {
        let _guard = self.load_lock.lock();
        if self.global.is_loaded() {
            return;
        }
        for adapter in self.persistence.adapters() {
            let scope = format!("{}/load", adapter.name());
            match adapter.load(DocumentRef::Global) {
                Ok(Some(doc)) => match self.global.merge_document(&doc) {
                    Ok(()) => self.oplog.resolve(&scope),
                    Err(e) => {
                        self.oplog.report_failure(&scope, &e);
                    }
                },
                Ok(None) => self.oplog.resolve(&scope),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    self.oplog.report_failure(&scope, &e);
                }
            }
        }
        // Failed loads count too: a later retry would overwrite what this
        // process has counted since.
        self.global.mark_loaded();
    }

    fn load_session(&self, session: &mut SessionContext) {
        if let Some(id) = session.id().map(str::to_string) {
            for adapter in self.persistence.adapters() {
                let scope = format!("{}/load", adapter.name());
                let loaded = adapter
                    .load(DocumentRef::Session(&id))
                    .and_then(|doc| match doc {
                        Some(doc) => session.aggregate.merge_document(&doc),
                        None => Ok(()),
                    });
                match loaded {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        self.oplog.report_failure(&scope, &e);
                    }
                }
            }
        }
        session.aggregate.loaded_from_remote = true;
    }

    /// Saves through every adapter. Failures are reported; only those of an
    /// adapter that surfaces save errors are returned.
    fn save(&self, session: Option<&SessionContext>) -> Result<()> {
        if self.persistence.is_empty() {
            return Ok(());
        }
        // Saves run one at a time, each with a snapshot taken under the lock,
        // so the last write always carries the newest counts.
        let _guard = self.save_lock.lock();
        let global = self.global.snapshot();
        let session_doc = session.and_then(|s| {
            s.id().map(|id| SessionDocument {
                id,
                aggregate: &s.aggregate,
            })
        });

        let mut surfaced: Option<AnalyticsError> = None;
        for adapter in self.persistence.adapters() {
            let scope = format!("{}/save", adapter.name());
            match adapter.save(&global, session_doc) {
                Ok(()) => self.oplog.resolve(&scope),
                Err(e) => {
                    self.oplog.report_failure(&scope, &e);
                    if adapter.surfaces_save_errors() && surfaced.is_none() {
                        surfaced = Some(e);
                    }
                }
            }
        }
        match surfaced {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// An active session wrapped around a [`WidgetHost`].
///
/// Every widget call goes to the host first; the produced value is handed to
/// the installed interceptor and then returned unchanged.
pub struct Tracker<'a, H: WidgetHost> {
    analytics: &'a Analytics,
    session: &'a mut SessionContext,
    host: H,
    owns: bool,
    stopped: bool,
}

impl<H: WidgetHost> Tracker<'_, H> {
    pub fn session(&self) -> &SessionContext {
        self.session
    }

    pub fn host(&mut self) -> &mut H {
        &mut self.host
    }

    /// Whether this tracker records anything.
    pub fn is_recording(&self) -> bool {
        self.owns && !self.stopped
    }

    /// Records active time, saves and uninstalls the interceptors. Only a
    /// failed local snapshot save is returned.
    pub fn stop(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        if !self.owns {
            return Ok(());
        }
        self.analytics.deactivate(self.session)
    }

    fn observe(&mut self, label: &str, observation: Observation<'_>) {
        if !self.is_recording() {
            return;
        }
        let Some(interceptor) = self.session.installed.get(observation.kind()) else {
            return;
        };
        let session = &mut *self.session;
        let mut ix = Interaction {
            key: WidgetKey::new(label),
            global: &self.analytics.global,
            session: &mut session.aggregate,
            last_values: &mut session.last_values,
        };
        interceptor(&mut ix, &observation);
    }
}

impl<H: WidgetHost> WidgetHost for Tracker<'_, H> {
    fn trigger(&mut self, label: &str) -> bool {
        let produced = self.host.trigger(label);
        self.observe(label, Observation::Trigger(produced));
        produced
    }

    fn select_one(&mut self, label: &str, options: &[&str]) -> Option<String> {
        let produced = self.host.select_one(label, options);
        self.observe(
            label,
            Observation::SelectOne {
                options,
                selected: produced.as_deref(),
            },
        );
        produced
    }

    fn select_many(&mut self, label: &str, options: &[&str]) -> Vec<String> {
        let produced = self.host.select_many(label, options);
        self.observe(
            label,
            Observation::SelectMany {
                options,
                selected: &produced,
            },
        );
        produced
    }

    fn input_value(&mut self, label: &str) -> WidgetValue {
        let produced = self.host.input_value(label);
        self.observe(label, Observation::Value(&produced));
        produced
    }

    fn submission(&mut self, placeholder: &str) -> Option<String> {
        let produced = self.host.submission(placeholder);
        self.observe(placeholder, Observation::Submission(produced.as_deref()));
        produced
    }
}

impl<H: WidgetHost> Drop for Tracker<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!("stop_tracking on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::date_key;
    use crate::core::persistence::{
        DocumentStore, PersistenceAdapter, SnapshotAdapter, SqliteDocumentStore,
    };
    use crate::models::{RemoteBackend, RemoteSettings, StorageSettings, DEFAULT_COLLECTION};
    use std::collections::HashMap;

    /// Host that returns whatever the test set for each label, the way a real
    /// host returns its retained widget state on rerun.
    #[derive(Default)]
    struct ScriptedHost {
        flags: HashMap<String, bool>,
        picks: HashMap<String, String>,
        multi: HashMap<String, Vec<String>>,
        values: HashMap<String, WidgetValue>,
        chat: Option<String>,
    }

    impl WidgetHost for ScriptedHost {
        fn trigger(&mut self, label: &str) -> bool {
            self.flags.get(label).copied().unwrap_or(false)
        }

        fn select_one(&mut self, label: &str, options: &[&str]) -> Option<String> {
            self.picks
                .get(label)
                .cloned()
                .or_else(|| options.first().map(|s| s.to_string()))
        }

        fn select_many(&mut self, label: &str, _options: &[&str]) -> Vec<String> {
            self.multi.get(label).cloned().unwrap_or_default()
        }

        fn input_value(&mut self, label: &str) -> WidgetValue {
            self.values.get(label).cloned().unwrap_or(WidgetValue::Int(0))
        }

        fn submission(&mut self, _placeholder: &str) -> Option<String> {
            self.chat.take()
        }
    }

    fn memory_only() -> Analytics {
        Analytics::with_persistence(Settings::default(), Persistence::none())
    }

    fn with_snapshot(path: &Path) -> Settings {
        Settings {
            storage: StorageSettings {
                snapshot_path: Some(path.to_path_buf()),
                ..StorageSettings::default()
            },
            ..Settings::default()
        }
    }

    fn script(t: &mut Tracker<'_, &mut ScriptedHost>) {
        t.trigger("Agree");
        t.select_one("Pet", &["cat", "dog"]);
    }

    #[test]
    fn reruns_count_only_genuine_interactions() {
        let analytics = memory_only();
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();

        for (agree, pet) in [(false, "cat"), (true, "cat"), (true, "dog")] {
            host.flags.insert("Agree".into(), agree);
            host.picks.insert("Pet".into(), pet.into());
            analytics.track(&mut session, &mut host, script).expect("track");
        }

        let global = analytics.counts();
        assert_eq!(global.widget_total("Agree"), 1);
        let pet = global.widget("Pet").expect("tracked");
        assert_eq!(pet.count(Some("cat")), 1);
        assert_eq!(pet.count(Some("dog")), 1);
        assert_eq!(global.total_script_runs, 3);
        assert_eq!(global.total_pageviews, 1);
        for key in ["Agree", "Pet"] {
            assert_eq!(global.widget_total(key), global.per_day_total(key));
        }
        assert_eq!(session.aggregate().widgets, global.widgets);
        assert_eq!(session.state(), TrackingState::Inactive);
    }

    #[test]
    fn produced_values_pass_through_unmodified() {
        let analytics = memory_only();
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        host.multi.insert("Tags".into(), vec!["a".into(), "".into()]);
        host.values.insert("Name".into(), WidgetValue::Text(String::new()));
        host.chat = Some("hello".into());

        let (tags, name, chat) = analytics
            .track(&mut session, &mut host, |t| {
                (
                    t.select_many("Tags", &["a", "b"]),
                    t.input_value("Name"),
                    t.submission("Say something"),
                )
            })
            .expect("track");

        assert_eq!(tags, vec!["a".to_string(), String::new()]);
        assert_eq!(name, WidgetValue::Text(String::new()));
        assert_eq!(chat.as_deref(), Some("hello"));

        let global = analytics.counts();
        assert_eq!(global.widget("Tags").map(|s| s.count(Some("(empty)"))), Some(1));
        assert_eq!(global.widget("Name").map(|s| s.count(Some("(empty)"))), Some(1));
        assert_eq!(global.widget("Say something").map(|s| s.count(Some("hello"))), Some(1));
    }

    #[test]
    fn start_on_active_session_is_a_no_op() {
        let analytics = memory_only();
        let mut session = SessionContext::anonymous();
        session.state = TrackingState::Active;
        let mut host = ScriptedHost::default();
        host.flags.insert("Go".into(), true);

        {
            let mut tracker = analytics.start_tracking(&mut session, &mut host);
            assert!(!tracker.is_recording());
            assert!(tracker.trigger("Go"));
        }

        let global = analytics.counts();
        assert_eq!(global.total_script_runs, 0);
        assert_eq!(global.widget_total("Go"), 0);
        assert_eq!(session.state(), TrackingState::Active);
    }

    #[test]
    fn disabled_engine_only_passes_through() {
        let settings = Settings {
            enabled: false,
            ..Settings::default()
        };
        let analytics = Analytics::with_persistence(settings, Persistence::none());
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        host.flags.insert("Go".into(), true);

        let pressed = analytics
            .track(&mut session, &mut host, |t| t.trigger("Go"))
            .expect("track");
        assert!(pressed);
        assert_eq!(analytics.counts().total_script_runs, 0);
        assert!(analytics.counts().widgets.is_empty());
    }

    #[test]
    fn untracked_kinds_are_not_counted() {
        let settings = Settings {
            tracked_operations: vec![OperationKind::Trigger],
            ..Settings::default()
        };
        let analytics = Analytics::with_persistence(settings, Persistence::none());
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        host.flags.insert("Agree".into(), true);

        analytics.track(&mut session, &mut host, script).expect("track");
        let global = analytics.counts();
        assert_eq!(global.widget_total("Agree"), 1);
        assert!(global.widget("Pet").is_none());
    }

    #[test]
    fn concurrent_sessions_share_one_snapshot_without_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counts.json");
        let analytics = Analytics::new(with_snapshot(&path));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let analytics = &analytics;
                scope.spawn(move || {
                    let mut session = SessionContext::generated();
                    let mut host = ScriptedHost::default();
                    for run in 0..30 {
                        host.flags.insert("Go".into(), run % 2 == 1);
                        analytics
                            .track(&mut session, &mut host, |t| t.trigger("Go"))
                            .expect("every stop saves");
                    }
                });
            }
        });

        let restarted = Analytics::new(with_snapshot(&path));
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        restarted
            .track(&mut session, &mut host, |_| ())
            .expect("track");
        let global = restarted.counts();
        assert_eq!(global.widget_total("Go"), 120);
        assert_eq!(global.total_script_runs, 241);
    }

    #[test]
    fn concurrent_sessions_do_not_lose_updates() {
        let analytics = memory_only();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let analytics = &analytics;
                scope.spawn(move || {
                    let mut session = SessionContext::generated();
                    let mut host = ScriptedHost::default();
                    for run in 0..50 {
                        host.flags.insert("Go".into(), run % 2 == 1);
                        analytics
                            .track(&mut session, &mut host, |t| t.trigger("Go"))
                            .expect("track");
                    }
                    assert_eq!(session.aggregate().widget_total("Go"), 25);
                });
            }
        });

        let global = analytics.counts();
        assert_eq!(global.widget_total("Go"), 200);
        assert_eq!(global.per_day_total("Go"), 200);
        assert_eq!(global.total_script_runs, 400);
        assert_eq!(global.total_pageviews, 8);
    }

    #[test]
    fn snapshot_survives_a_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counts.json");

        {
            let analytics = Analytics::new(with_snapshot(&path));
            let mut session = SessionContext::anonymous();
            let mut host = ScriptedHost::default();
            host.flags.insert("Agree".into(), true);
            host.picks.insert("Pet".into(), "dog".into());
            analytics.track(&mut session, &mut host, script).expect("track");
        }
        assert!(path.exists());

        let analytics = Analytics::new(with_snapshot(&path));
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        analytics.track(&mut session, &mut host, script).expect("track");

        let global = analytics.counts();
        assert_eq!(global.total_script_runs, 2);
        assert_eq!(global.total_pageviews, 2);
        assert_eq!(global.widget_total("Agree"), 1);
        assert_eq!(global.widget("Pet").map(|s| s.count(Some("dog"))), Some(1));
        assert_eq!(global.widget("Pet").map(|s| s.count(Some("cat"))), Some(1));
    }

    #[test]
    fn failed_snapshot_save_is_returned_but_counts_survive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").expect("write");

        let settings = Settings {
            log_dir: Some(dir.path().join("logs")),
            ..with_snapshot(&blocker.join("counts.json"))
        };
        let analytics = Analytics::new(settings);
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        host.flags.insert("Go".into(), true);

        let result = analytics.track(&mut session, &mut host, |t| t.trigger("Go"));
        assert!(result.is_err());
        assert_eq!(analytics.counts().widget_total("Go"), 1);
        assert_eq!(session.state(), TrackingState::Inactive);

        // A second failure of the same kind is not reported again.
        assert!(analytics.track(&mut session, &mut host, |_| ()).is_err());
        let records = analytics.oplog().read(10, Some("snapshot/save")).expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].scope, "snapshot/save");
        analytics.oplog().clear().expect("clear");
        assert!(analytics.oplog().read(10, None).expect("read").is_empty());
    }

    #[test]
    fn panicking_body_still_stops_and_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counts.json");
        let analytics = Analytics::new(with_snapshot(&path));
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            analytics.track(&mut session, &mut host, |t| {
                t.trigger("Go");
                panic!("script failed");
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(session.state(), TrackingState::Inactive);
        assert!(path.exists());
    }

    fn sqlite_settings(path: &Path) -> Settings {
        Settings {
            storage: StorageSettings {
                remote: Some(RemoteSettings {
                    backend: RemoteBackend::Sqlite,
                    sqlite_path: Some(path.to_path_buf()),
                    ..RemoteSettings::default()
                }),
                ..StorageSettings::default()
            },
            ..Settings::default()
        }
    }

    #[test]
    fn delete_session_data_leaves_the_aggregate_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("docs.sqlite");
        let analytics = Analytics::new(sqlite_settings(&db));

        let mut session = SessionContext::new(Some("s1".into()));
        let mut host = ScriptedHost::default();
        host.flags.insert("Go".into(), true);
        analytics
            .track(&mut session, &mut host, |t| t.trigger("Go"))
            .expect("track");

        let store = SqliteDocumentStore::open(&db).expect("open");
        assert!(store.get(DEFAULT_COLLECTION, "s1").expect("get").is_some());

        analytics.delete_session_data("s1").expect("delete");
        assert!(store.get(DEFAULT_COLLECTION, "s1").expect("get").is_none());
        assert!(store.get(DEFAULT_COLLECTION, "counts").expect("get").is_some());
        assert_eq!(analytics.counts().widget_total("Go"), 1);

        let err = analytics.delete_session_data("counts").expect_err("protected");
        assert_eq!(err.kind(), "permission_denied");
        assert!(store.get(DEFAULT_COLLECTION, "counts").expect("get").is_some());
    }

    #[test]
    fn session_document_is_loaded_once_on_return() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("docs.sqlite");
        {
            let analytics = Analytics::new(sqlite_settings(&db));
            let mut session = SessionContext::new(Some("visitor".into()));
            let mut host = ScriptedHost::default();
            analytics
                .track(&mut session, &mut host, |t| t.trigger("Go"))
                .expect("track");
        }

        let analytics = Analytics::new(sqlite_settings(&db));
        let mut session = SessionContext::new(Some("visitor".into()));
        let mut host = ScriptedHost::default();
        for _ in 0..2 {
            analytics
                .track(&mut session, &mut host, |t| t.trigger("Go"))
                .expect("track");
        }
        assert_eq!(session.aggregate().total_script_runs, 3);
        assert_eq!(analytics.counts().total_script_runs, 3);
    }

    #[test]
    fn reset_zeroes_counts_and_persists_the_fresh_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counts.json");
        let analytics = Analytics::new(with_snapshot(&path));
        let mut session = SessionContext::anonymous();
        let mut host = ScriptedHost::default();
        host.flags.insert("Go".into(), true);
        analytics
            .track(&mut session, &mut host, |t| t.trigger("Go"))
            .expect("track");

        analytics.reset(Some(&mut session)).expect("reset");

        for agg in [analytics.counts(), session.aggregate().clone()] {
            assert_eq!(agg.total_script_runs, 0);
            assert_eq!(agg.total_pageviews, 0);
            assert_eq!(agg.widget_total("Go"), 0);
            assert_eq!(agg.per_day.len(), 1);
            assert_eq!(agg.per_day[0].date, date_key::yesterday());
        }

        let doc = SnapshotAdapter::new(&path)
            .load(DocumentRef::Global)
            .expect("load")
            .expect("present");
        assert_eq!(doc.get("total_script_runs"), Some(&serde_json::json!(0)));
    }
}
