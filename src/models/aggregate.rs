use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::day_bucket::DayBucket;
use super::widget::{WidgetKey, WidgetShape, WidgetStat};
use crate::core::date_key;
use crate::error::{AnalyticsError, Result};

/// A stored document: top-level field name to JSON value.
pub type Document = serde_json::Map<String, Value>;

/// Full counter, time and day-bucket state for one scope (global or one session).
///
/// Every counter mutation is applied to the top-level totals and to the day
/// bucket for the same date, so summing a widget over `per_day` always equals
/// its top-level count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub total_pageviews: u64,
    #[serde(default)]
    pub total_script_runs: u64,
    #[serde(default)]
    pub total_active_seconds: f64,
    #[serde(default)]
    pub widgets: BTreeMap<WidgetKey, WidgetStat>,
    #[serde(default)]
    pub per_day: Vec<DayBucket>,
    /// Whether persisted state was already applied to this aggregate.
    #[serde(skip)]
    pub loaded_from_remote: bool,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::fresh()
    }
}

impl Aggregate {
    pub fn fresh() -> Self {
        Self::fresh_on(Utc::now(), date_key::today())
    }

    /// All-zero aggregate with one seed bucket dated the day before `today`,
    /// so a chart over `per_day` always has two points once today is recorded.
    pub fn fresh_on(now: DateTime<Utc>, today: NaiveDate) -> Self {
        let seed = today
            .checked_sub_signed(Duration::days(1))
            .unwrap_or(today);
        Self {
            start_time: now,
            total_pageviews: 0,
            total_script_runs: 0,
            total_active_seconds: 0.0,
            widgets: BTreeMap::new(),
            per_day: vec![DayBucket::new(seed)],
            loaded_from_remote: false,
        }
    }

    pub fn widget(&self, key: &str) -> Option<&WidgetStat> {
        self.widgets.get(key)
    }

    pub fn bucket(&self, date: NaiveDate) -> Option<&DayBucket> {
        self.per_day
            .binary_search_by(|b| b.date.cmp(&date))
            .ok()
            .map(|idx| &self.per_day[idx])
    }

    /// Bucket for `date`, inserted at its chronological position when missing.
    pub fn bucket_mut(&mut self, date: NaiveDate) -> &mut DayBucket {
        // Fast path: mutations almost always hit the latest day.
        let last_matches = self.per_day.last().map(|b| b.date == date).unwrap_or(false);
        if last_matches {
            let last = self.per_day.len() - 1;
            return &mut self.per_day[last];
        }

        let idx = match self.per_day.binary_search_by(|b| b.date.cmp(&date)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.per_day.insert(idx, DayBucket::new(date));
                idx
            }
        };
        &mut self.per_day[idx]
    }

    /// Creates a zero stat of `shape` for `key` if absent and pre-registers
    /// `options` at zero. Returns false when the key already holds the other
    /// shape; the existing representation is kept.
    pub fn ensure_widget(&mut self, key: &WidgetKey, shape: WidgetShape, options: &[&str]) -> bool {
        let stat = self
            .widgets
            .entry(key.clone())
            .or_insert_with(|| WidgetStat::zero(shape));
        if stat.shape() != shape {
            return false;
        }
        for option in options {
            stat.register_option(option);
        }
        true
    }

    pub fn record_interaction(&mut self, key: &WidgetKey, value: Option<&str>) -> bool {
        self.record_interaction_on(date_key::today(), key, value)
    }

    /// Adds exactly one to the widget (scalar) or to its `value` slot (mapping),
    /// top-level and in the day bucket for `date`.
    pub fn record_interaction_on(
        &mut self,
        date: NaiveDate,
        key: &WidgetKey,
        value: Option<&str>,
    ) -> bool {
        let shape = match value {
            Some(_) => WidgetShape::Choice,
            None => WidgetShape::Counter,
        };
        let stat = self
            .widgets
            .entry(key.clone())
            .or_insert_with(|| WidgetStat::zero(shape));
        let shape = stat.shape();
        if !stat.increment(value) {
            return false;
        }
        self.bucket_mut(date).add_interaction(key, shape, value);
        true
    }

    pub fn record_render(&mut self, script_runs: u64, pageviews: u64) {
        self.record_render_on(date_key::today(), script_runs, pageviews);
    }

    pub fn record_render_on(&mut self, date: NaiveDate, script_runs: u64, pageviews: u64) {
        self.total_script_runs = self.total_script_runs.saturating_add(script_runs);
        self.total_pageviews = self.total_pageviews.saturating_add(pageviews);
        self.bucket_mut(date).add_render(script_runs, pageviews);
    }

    pub fn record_active_time(&mut self, seconds: f64) {
        self.record_active_time_on(date_key::today(), seconds);
    }

    pub fn record_active_time_on(&mut self, date: NaiveDate, seconds: f64) {
        if !(seconds > 0.0) {
            return;
        }
        self.total_active_seconds += seconds;
        self.bucket_mut(date).add_active_seconds(seconds);
    }

    pub fn widget_total(&self, key: &str) -> u64 {
        self.widgets.get(key).map(WidgetStat::total).unwrap_or(0)
    }

    /// Same key summed across every day bucket.
    pub fn per_day_total(&self, key: &str) -> u64 {
        self.per_day
            .iter()
            .map(|b| b.widget_total(key))
            .fold(0u64, |acc, v| acc.saturating_add(v))
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(AnalyticsError::MalformedData(
                "aggregate did not serialize to an object".to_string(),
            )),
        }
    }

    /// Copies the fields of `doc` that already exist on this aggregate; unknown
    /// fields are ignored and fields absent from `doc` keep their current value.
    /// On a parse failure `self` is left untouched.
    pub fn merge_document(&mut self, doc: &Document) -> Result<()> {
        let mut current = self.to_document()?;
        let mut copied = 0usize;
        for (field, value) in doc {
            if let Some(slot) = current.get_mut(field) {
                *slot = value.clone();
                copied += 1;
            }
        }
        if copied == 0 {
            return Ok(());
        }

        let mut merged: Aggregate = serde_json::from_value(Value::Object(current))?;
        merged.normalize();
        merged.loaded_from_remote = self.loaded_from_remote;
        *self = merged;
        Ok(())
    }

    /// Restores the chronological order of `per_day`, folding duplicate dates.
    pub fn normalize(&mut self) {
        if self.per_day.windows(2).all(|w| w[0].date < w[1].date) {
            return;
        }

        let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
        for bucket in self.per_day.drain(..) {
            match days.get_mut(&bucket.date) {
                Some(existing) => {
                    existing.add_render(bucket.script_runs, bucket.pageviews);
                    existing.add_active_seconds(bucket.active_seconds);
                    for (key, stat) in bucket.widgets {
                        let slot = existing
                            .widgets
                            .entry(key)
                            .or_insert_with(|| WidgetStat::zero(stat.shape()));
                        merge_stat(slot, &stat);
                    }
                }
                None => {
                    days.insert(bucket.date, bucket);
                }
            }
        }
        self.per_day = days.into_values().collect();
    }
}

fn merge_stat(into: &mut WidgetStat, from: &WidgetStat) {
    match (into, from) {
        (WidgetStat::Counter(a), WidgetStat::Counter(b)) => *a = a.saturating_add(*b),
        (WidgetStat::Choice(a), WidgetStat::Choice(b)) => {
            for (option, count) in b {
                let slot = a.entry(option.clone()).or_insert(0);
                *slot = slot.saturating_add(*count);
            }
        }
        _ => {}
    }
}
