use log::warn;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::detector::{self, LastValue, LastValueCache};
use super::store::SharedAggregate;
use crate::models::{replace_empty, Aggregate, OperationKind, WidgetKey, WidgetShape, WidgetValue};

/// What a wrapped host call produced, as seen by an interceptor.
#[derive(Debug, Clone, Copy)]
pub enum Observation<'a> {
    Trigger(bool),
    SelectOne {
        options: &'a [&'a str],
        selected: Option<&'a str>,
    },
    SelectMany {
        options: &'a [&'a str],
        selected: &'a [String],
    },
    Value(&'a WidgetValue),
    Submission(Option<&'a str>),
}

impl Observation<'_> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Observation::Trigger(_) => OperationKind::Trigger,
            Observation::SelectOne { .. } => OperationKind::SelectOne,
            Observation::SelectMany { .. } => OperationKind::SelectMany,
            Observation::Value(_) => OperationKind::Value,
            Observation::Submission(_) => OperationKind::Submission,
        }
    }
}

/// Everything one interceptor call may touch: both aggregate scopes and the
/// session's last-value cache.
pub struct Interaction<'a> {
    pub key: WidgetKey,
    pub global: &'a SharedAggregate,
    pub session: &'a mut Aggregate,
    pub last_values: &'a mut LastValueCache,
}

impl Interaction<'_> {
    /// Registers the widget in both scopes. False when the label is already
    /// tracked with the other shape in either scope.
    pub fn ensure(&mut self, shape: WidgetShape, options: &[&str]) -> bool {
        let global_ok = self.global.ensure_widget(&self.key, shape, options);
        let session_ok = self.session.ensure_widget(&self.key, shape, options);
        if !(global_ok && session_ok) {
            warn!(
                "widget {:?} is already tracked with a different shape; skipping",
                self.key.as_str()
            );
            return false;
        }
        true
    }

    /// One genuine interaction, applied to the global and the session scope.
    pub fn record(&mut self, value: Option<&str>) {
        self.global.record_interaction(&self.key, value);
        self.session.record_interaction(&self.key, value);
    }

    pub fn previous(&self) -> Option<&LastValue> {
        self.last_values.get(&self.key)
    }

    pub fn remember(&mut self, value: LastValue) {
        self.last_values.store(&self.key, value);
    }
}

pub type Interceptor = fn(&mut Interaction<'_>, &Observation<'_>);

/// Operation kind to interceptor. Built once at startup, copied into a session
/// by `start_tracking` and cleared again by `stop_tracking`.
#[derive(Clone, Default)]
pub struct InterceptorTable {
    entries: HashMap<OperationKind, Interceptor>,
}

impl fmt::Debug for InterceptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

impl InterceptorTable {
    pub fn with_defaults(kinds: &[OperationKind]) -> Self {
        let mut table = Self::default();
        for kind in kinds {
            table.register(*kind, default_interceptor(*kind));
        }
        table
    }

    pub fn register(&mut self, kind: OperationKind, interceptor: Interceptor) {
        self.entries.insert(kind, interceptor);
    }

    pub fn remove(&mut self, kind: OperationKind) {
        self.entries.remove(&kind);
    }

    pub fn get(&self, kind: OperationKind) -> Option<Interceptor> {
        self.entries.get(&kind).copied()
    }

    pub fn kinds(&self) -> BTreeSet<OperationKind> {
        self.entries.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn default_interceptor(kind: OperationKind) -> Interceptor {
    match kind {
        OperationKind::Trigger => intercept_trigger,
        OperationKind::SelectOne => intercept_select_one,
        OperationKind::SelectMany => intercept_select_many,
        OperationKind::Value => intercept_value,
        OperationKind::Submission => intercept_submission,
    }
}

fn intercept_trigger(ix: &mut Interaction<'_>, observation: &Observation<'_>) {
    let Observation::Trigger(produced) = *observation else {
        return;
    };
    let current = LastValue::Flag(produced);
    if ix.ensure(WidgetShape::Counter, &[]) && detector::changed(ix.previous(), &current) {
        ix.record(None);
    }
    ix.remember(current);
}

fn intercept_select_one(ix: &mut Interaction<'_>, observation: &Observation<'_>) {
    let Observation::SelectOne { options, selected } = *observation else {
        return;
    };
    let selected = selected.map(replace_empty);
    let current = LastValue::Value(selected.clone());
    if ix.ensure(WidgetShape::Choice, options) && detector::changed(ix.previous(), &current) {
        ix.record(selected.as_deref());
    }
    ix.remember(current);
}

fn intercept_select_many(ix: &mut Interaction<'_>, observation: &Observation<'_>) {
    let Observation::SelectMany { options, selected } = *observation else {
        return;
    };
    let current = LastValue::Selection(selected.iter().map(|s| replace_empty(s)).collect());
    if ix.ensure(WidgetShape::Choice, options) {
        let fresh: Vec<String> = detector::newly_selected(ix.previous(), &current)
            .into_iter()
            .map(str::to_string)
            .collect();
        for option in &fresh {
            ix.record(Some(option));
        }
    }
    ix.remember(current);
}

fn intercept_value(ix: &mut Interaction<'_>, observation: &Observation<'_>) {
    let Observation::Value(value) = *observation else {
        return;
    };
    let formatted = value.canonical();
    let current = LastValue::Value(Some(formatted.clone()));
    if ix.ensure(WidgetShape::Choice, &[formatted.as_str()])
        && detector::changed(ix.previous(), &current)
    {
        ix.record(Some(&formatted));
    }
    ix.remember(current);
}

fn intercept_submission(ix: &mut Interaction<'_>, observation: &Observation<'_>) {
    let Observation::Submission(text) = *observation else {
        return;
    };
    let text = text.map(replace_empty);
    let current = LastValue::Value(text.clone());
    let registered: Vec<&str> = text.as_deref().into_iter().collect();
    if ix.ensure(WidgetShape::Choice, &registered) && detector::changed(ix.previous(), &current) {
        ix.record(text.as_deref());
    }
    ix.remember(current);
}
