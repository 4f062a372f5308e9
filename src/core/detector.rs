//! Decides whether a produced widget value is a genuine new interaction.
//!
//! The host reruns the whole script on every interaction and most widgets hand
//! back their retained value on each rerun; these predicates compare against
//! the last value the proxy saw so reruns are not counted twice. They are pure;
//! the caller stores the new [`LastValue`] afterwards.

use std::collections::{BTreeSet, HashMap};

use crate::models::WidgetKey;

/// Last value observed for a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastValue {
    Flag(bool),
    Value(Option<String>),
    Selection(BTreeSet<String>),
}

/// Per-session cache of last observed values.
#[derive(Debug, Clone, Default)]
pub struct LastValueCache {
    entries: HashMap<WidgetKey, LastValue>,
}

impl LastValueCache {
    pub fn get(&self, key: &WidgetKey) -> Option<&LastValue> {
        self.entries.get(key)
    }

    pub fn store(&mut self, key: &WidgetKey, value: LastValue) {
        self.entries.insert(key.clone(), value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `true` when `current` is a new interaction relative to `previous`.
///
/// A previous entry of a different variant is treated as absent.
pub fn changed(previous: Option<&LastValue>, current: &LastValue) -> bool {
    match current {
        LastValue::Flag(now) => *now && !matches!(previous, Some(LastValue::Flag(true))),
        LastValue::Value(None) => false,
        LastValue::Value(Some(now)) => match previous {
            Some(LastValue::Value(Some(before))) => before != now,
            _ => true,
        },
        LastValue::Selection(_) => !newly_selected(previous, current).is_empty(),
    }
}

/// Options present in `current` and absent from the previous selection.
pub fn newly_selected<'a>(previous: Option<&LastValue>, current: &'a LastValue) -> Vec<&'a str> {
    let LastValue::Selection(now) = current else {
        return Vec::new();
    };
    match previous {
        Some(LastValue::Selection(before)) => now
            .iter()
            .filter(|option| !before.contains(option.as_str()))
            .map(String::as_str)
            .collect(),
        _ => now.iter().map(String::as_str).collect(),
    }
}
