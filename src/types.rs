use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Counts at or below this value are suppressed
pub const DEFAULT_SUPPRESSION_THRESHOLD: u64 = 5;

/// Visible counts are rounded to a multiple of this value
pub const DEFAULT_ROUNDING_UNIT: u64 = 10;

/// Name of the count column every aggregate query produces
pub const ROW_COUNT_COLUMN: &str = "row_count";

/// Default count expression for grouped extractions
pub const DEFAULT_COUNT_EXPRESSION: &str = "count(*)";

/// Reporting-period column of the waiting-list tables
pub const DEFAULT_DATE_COLUMN: &str = "Week_Ending_Date";

/// A single cell returned by the query layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::Date(_) => 2,
            Value::Text(_) => 3,
        }
    }

    /// Total order used for sorting result rows: nulls first, then numbers,
    /// dates and text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ if self.rank() == 1 && other.rank() == 1 => {
                let a = self.as_f64().unwrap_or(f64::NAN);
                let b = other.as_f64().unwrap_or(f64::NAN);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Lexicographic comparison of two key tuples
pub fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.sort_cmp(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Tabular result: named columns and positional rows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Kind of values held by a column, used for comparison dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Date,
    Text,
    /// Every value is missing
    Empty,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Date => "date",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// One group of an aggregate query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub keys: Vec<Value>,
    pub row_count: u64,
}

impl GroupedRow {
    pub fn new(keys: Vec<Value>, row_count: u64) -> Self {
        Self { keys, row_count }
    }
}

/// Grouped count table.
///
/// Keys are unique as the query returns them. Coercing a key to a date or to
/// missing can repeat a key; such rows stay separate because counts like
/// `count(distinct ...)` cannot be added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedCount {
    pub group_columns: Vec<String>,
    pub rows: Vec<GroupedRow>,
}

impl GroupedCount {
    pub fn new(group_columns: Vec<String>) -> Self {
        Self {
            group_columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.group_columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Stable sort by key; rows with equal keys keep their order
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| compare_keys(&a.keys, &b.keys));
    }

    /// Sort by key and merge rows whose keys compare equal. Only for
    /// counts that may be added, such as rounded counts per period.
    pub fn normalize(&mut self) -> usize {
        self.rows.sort_by(|a, b| compare_keys(&a.keys, &b.keys));
        let before = self.rows.len();
        let mut merged: Vec<GroupedRow> = Vec::with_capacity(before);
        for row in self.rows.drain(..) {
            match merged.last_mut() {
                Some(last) if compare_keys(&last.keys, &row.keys) == Ordering::Equal => {
                    last.row_count += row.row_count;
                }
                _ => merged.push(row),
            }
        }
        self.rows = merged;
        before - self.rows.len()
    }

    pub fn to_table(&self) -> Table {
        let mut columns = self.group_columns.clone();
        columns.push(ROW_COUNT_COLUMN.to_string());
        let mut table = Table::new(columns);
        for row in &self.rows {
            let mut cells = row.keys.clone();
            cells.push(Value::Integer(row.row_count as i64));
            table.rows.push(cells);
        }
        table
    }
}

/// Output of suppression and rounding.
///
/// `rows` holds rounded counts only. Suppressed groups are either dropped or,
/// with `keep_suppressed`, kept with their rounded (near-zero) count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppressedTable {
    pub group_columns: Vec<String>,
    pub rows: Vec<GroupedRow>,
    /// Number of input groups at or below the threshold
    pub suppressed_groups: usize,
    pub options: DisclosureOptions,
}

impl SuppressedTable {
    pub fn to_grouped(&self) -> GroupedCount {
        GroupedCount {
            group_columns: self.group_columns.clone(),
            rows: self.rows.clone(),
        }
    }

    pub fn to_table(&self) -> Table {
        self.to_grouped().to_table()
    }
}

/// Disclosure-control settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisclosureOptions {
    /// Counts at or below this value are suppressed
    pub threshold: u64,

    /// Rounding unit for visible counts
    pub rounding_unit: u64,

    /// Keep suppressed groups (with rounded counts) instead of dropping them
    pub keep_suppressed: bool,
}

impl Default for DisclosureOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SUPPRESSION_THRESHOLD,
            rounding_unit: DEFAULT_ROUNDING_UNIT,
            keep_suppressed: false,
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
