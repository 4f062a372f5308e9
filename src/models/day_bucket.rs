use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::widget::{WidgetKey, WidgetShape, WidgetStat};

/// One calendar day's slice of an [`super::Aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    #[serde(default)]
    pub pageviews: u64,
    #[serde(default)]
    pub script_runs: u64,
    #[serde(default)]
    pub active_seconds: f64,
    #[serde(default)]
    pub widgets: BTreeMap<WidgetKey, WidgetStat>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            pageviews: 0,
            script_runs: 0,
            active_seconds: 0.0,
            widgets: BTreeMap::new(),
        }
    }

    pub fn add_render(&mut self, script_runs: u64, pageviews: u64) {
        self.script_runs = self.script_runs.saturating_add(script_runs);
        self.pageviews = self.pageviews.saturating_add(pageviews);
    }

    pub fn add_active_seconds(&mut self, seconds: f64) {
        if !(seconds > 0.0) {
            return;
        }
        self.active_seconds += seconds;
    }

    /// Mirrors one top-level increment into this day. The day's stat takes the
    /// shape of the top-level stat; a mismatching leftover is replaced.
    pub fn add_interaction(&mut self, key: &WidgetKey, shape: WidgetShape, value: Option<&str>) {
        let stat = self
            .widgets
            .entry(key.clone())
            .or_insert_with(|| WidgetStat::zero(shape));
        if stat.shape() != shape {
            *stat = WidgetStat::zero(shape);
        }
        stat.increment(value);
    }

    pub fn widget_total(&self, key: &str) -> u64 {
        self.widgets.get(key).map(WidgetStat::total).unwrap_or(0)
    }
}
