use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::types::{GroupedCount, GroupedRow, Value};

/// Open date interval: both bounds are excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window from optional bounds; a missing bound leaves that side open
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self::new(
            start.unwrap_or(NaiveDate::MIN),
            end.unwrap_or(NaiveDate::MAX),
        ))
    }

    pub fn contains(&self, value: &Value) -> bool {
        match value.as_date() {
            Some(d) => d > self.start && d < self.end,
            None => false,
        }
    }

    /// Keep rows whose first key is a date inside the window
    pub fn filter_rows(&self, rows: Vec<GroupedRow>) -> Vec<GroupedRow> {
        rows.into_iter()
            .filter(|r| r.keys.first().map_or(false, |k| self.contains(k)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Month,
    Year,
}

impl Period {
    fn column_name(&self) -> &'static str {
        match self {
            Period::Month => "Month",
            Period::Year => "Year",
        }
    }

    fn key(&self, date: NaiveDate) -> Value {
        match self {
            Period::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .map(Value::Date)
                .unwrap_or(Value::Null),
            Period::Year => Value::Integer(date.year() as i64),
        }
    }
}

/// Sum counts by calendar month or year of the first key.
/// Rows without a date key are left out.
pub fn rollup_by_period(rows: &[GroupedRow], period: Period) -> GroupedCount {
    let mut out = GroupedCount::new(vec![period.column_name().to_string()]);
    for row in rows {
        if let Some(date) = row.keys.first().and_then(Value::as_date) {
            out.rows
                .push(GroupedRow::new(vec![period.key(date)], row.row_count));
        }
    }
    out.normalize();
    out
}
