use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Stored in place of empty labels and values; several stores reject empty keys.
pub const EMPTY_SENTINEL: &str = "(empty)";

/// Maps empty and whitespace-only strings to [`EMPTY_SENTINEL`].
pub fn replace_empty(raw: &str) -> String {
    if raw.trim().is_empty() {
        EMPTY_SENTINEL.to_string()
    } else {
        raw.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetKey(String);

impl WidgetKey {
    pub fn new(label: &str) -> Self {
        Self(replace_empty(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for WidgetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetShape {
    Counter,
    Choice,
}

/// Trackable host operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Buttons, checkboxes, toggles, file uploaders.
    Trigger,
    /// Radio, selectbox, select slider: one option out of many.
    SelectOne,
    /// Multiselect: any subset of the options.
    SelectMany,
    /// Sliders and free inputs producing a single value.
    Value,
    /// Chat-style free-form submission.
    Submission,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Trigger,
        OperationKind::SelectOne,
        OperationKind::SelectMany,
        OperationKind::Value,
        OperationKind::Submission,
    ];

    pub fn shape(self) -> WidgetShape {
        match self {
            OperationKind::Trigger => WidgetShape::Counter,
            _ => WidgetShape::Choice,
        }
    }
}

/// Per-widget counter. The shape is fixed when the widget is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WidgetStat {
    Counter(u64),
    Choice(BTreeMap<String, u64>),
}

impl WidgetStat {
    pub fn zero(shape: WidgetShape) -> Self {
        match shape {
            WidgetShape::Counter => WidgetStat::Counter(0),
            WidgetShape::Choice => WidgetStat::Choice(BTreeMap::new()),
        }
    }

    pub fn shape(&self) -> WidgetShape {
        match self {
            WidgetStat::Counter(_) => WidgetShape::Counter,
            WidgetStat::Choice(_) => WidgetShape::Choice,
        }
    }

    /// Sum of every counter held by this stat.
    pub fn total(&self) -> u64 {
        match self {
            WidgetStat::Counter(n) => *n,
            WidgetStat::Choice(map) => map.values().fold(0u64, |acc, v| acc.saturating_add(*v)),
        }
    }

    /// Count for one option, or the scalar count when `option` is `None`.
    pub fn count(&self, option: Option<&str>) -> u64 {
        match (self, option) {
            (WidgetStat::Counter(n), None) => *n,
            (WidgetStat::Choice(map), Some(option)) => map.get(option).copied().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn register_option(&mut self, option: &str) {
        if let WidgetStat::Choice(map) = self {
            map.entry(replace_empty(option)).or_insert(0);
        }
    }

    /// Adds one. Returns false when `value` does not fit the shape.
    pub fn increment(&mut self, value: Option<&str>) -> bool {
        match (self, value) {
            (WidgetStat::Counter(n), None) => {
                *n = n.saturating_add(1);
                true
            }
            (WidgetStat::Choice(map), Some(value)) => {
                let slot = map.entry(replace_empty(value)).or_insert(0);
                *slot = slot.saturating_add(1);
                true
            }
            _ => false,
        }
    }
}
