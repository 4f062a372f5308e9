use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::widget::EMPTY_SENTINEL;

/// Value produced by a scalar-value element (slider, text/number/date input, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Range(Box<WidgetValue>, Box<WidgetValue>),
}

impl WidgetValue {
    pub fn range(lo: WidgetValue, hi: WidgetValue) -> Self {
        WidgetValue::Range(Box::new(lo), Box::new(hi))
    }

    /// Canonical string used as the mapping key for this value.
    pub fn canonical(&self) -> String {
        match self {
            WidgetValue::Empty => EMPTY_SENTINEL.to_string(),
            WidgetValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            WidgetValue::Int(n) => n.to_string(),
            // Debug keeps the decimal point on whole numbers ("2.0").
            WidgetValue::Float(f) => format!("{:?}", f),
            WidgetValue::Text(s) if s.trim().is_empty() => EMPTY_SENTINEL.to_string(),
            WidgetValue::Text(s) => s.clone(),
            WidgetValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            WidgetValue::Time(t) => t.format("%H:%M:%S").to_string(),
            WidgetValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            WidgetValue::Range(lo, hi) => format!("{} - {}", lo.canonical(), hi.canonical()),
        }
    }
}

impl From<&str> for WidgetValue {
    fn from(s: &str) -> Self {
        WidgetValue::Text(s.to_string())
    }
}

impl From<i64> for WidgetValue {
    fn from(n: i64) -> Self {
        WidgetValue::Int(n)
    }
}

impl From<f64> for WidgetValue {
    fn from(f: f64) -> Self {
        WidgetValue::Float(f)
    }
}
