use rand::distributions::Alphanumeric;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

use super::detector::LastValueCache;
use super::proxy::InterceptorTable;
use crate::models::Aggregate;

const GENERATED_ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Inactive,
    Active,
}

/// State owned by one visitor's execution context. Never shared between
/// sessions, so nothing here is locked.
#[derive(Debug)]
pub struct SessionContext {
    id: Option<String>,
    pub(crate) aggregate: Aggregate,
    pub(crate) last_values: LastValueCache,
    pub(crate) state: TrackingState,
    pub(crate) installed: InterceptorTable,
    pub(crate) activated_at: Option<Instant>,
    pub(crate) pageview_recorded: bool,
}

impl SessionContext {
    /// `id` is an opaque storage key; `None` keeps this session out of the
    /// per-session documents.
    pub fn new(id: Option<String>) -> Self {
        Self {
            id: id.filter(|s| !s.trim().is_empty()),
            aggregate: Aggregate::fresh(),
            last_values: LastValueCache::default(),
            state: TrackingState::Inactive,
            installed: InterceptorTable::default(),
            activated_at: None,
            pageview_recorded: false,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn generated() -> Self {
        Self::new(Some(generate_session_id()))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TrackingState::Active
    }

    /// Fresh session counters; the last-value cache is kept so the next rerun
    /// does not count every retained widget value again.
    pub fn reset(&mut self) {
        let loaded = self.aggregate.loaded_from_remote;
        self.aggregate = Aggregate::fresh();
        self.aggregate.loaded_from_remote = loaded;
    }
}

pub fn generate_session_id() -> String {
    let mut rng = SmallRng::from_entropy();
    (0..GENERATED_ID_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_alphanumerics() {
        let a = SessionContext::generated();
        let b = SessionContext::generated();
        let a_id = a.id().expect("id");
        assert_eq!(a_id.len(), GENERATED_ID_LEN);
        assert!(a_id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn blank_id_means_anonymous() {
        assert_eq!(SessionContext::new(Some("  ".into())).id(), None);
        assert_eq!(SessionContext::anonymous().state(), TrackingState::Inactive);
    }
}
