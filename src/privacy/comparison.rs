use serde::Serialize;
use tracing::warn;

use crate::error::Error;
use crate::inference::{coerce_date, infer_kind, normalize_missing};
use crate::stats::PercentileSummary;
use crate::types::{ColumnKind, GroupedCount, GroupedRow, Result, Table, Value, ROW_COUNT_COLUMN};

/// Outcome of comparing column A against column B on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    AMissing,
    BMissing,
}

impl Comparison {
    /// Evaluate the label for a pair of values. Missing checks come first and
    /// A wins when both sides are missing.
    fn evaluate(a: &Value, b: &Value, kind: ColumnKind) -> Self {
        let ordering = match kind {
            ColumnKind::Date => match (a.as_date(), b.as_date()) {
                (None, _) => return Comparison::AMissing,
                (_, None) => return Comparison::BMissing,
                (Some(x), Some(y)) => x.partial_cmp(&y),
            },
            _ => match (a.as_f64(), b.as_f64()) {
                (None, _) => return Comparison::AMissing,
                (_, None) => return Comparison::BMissing,
                (Some(x), Some(y)) => x.partial_cmp(&y),
            },
        };

        match ordering {
            Some(std::cmp::Ordering::Less) => Comparison::Less,
            Some(std::cmp::Ordering::Greater) => Comparison::Greater,
            _ => Comparison::Equal,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Comparison::AMissing | Comparison::BMissing)
    }

    /// Human-readable label using the column names, e.g. `A < B`
    pub fn label(&self, column_a: &str, column_b: &str) -> String {
        match self {
            Comparison::Less => format!("{} < {}", column_a, column_b),
            Comparison::Equal => format!("{} = {}", column_a, column_b),
            Comparison::Greater => format!("{} > {}", column_a, column_b),
            Comparison::AMissing => format!("{} is missing", column_a),
            Comparison::BMissing => format!("{} is missing", column_b),
        }
    }
}

/// B minus A; whole days for dates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Difference {
    Integer(i64),
    Float(f64),
}

impl Difference {
    fn as_f64(self) -> f64 {
        match self {
            Difference::Integer(i) => i as f64,
            Difference::Float(f) => f,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Difference::Integer(i) => Value::Integer(i),
            Difference::Float(f) => Value::Float(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub a: Value,
    pub b: Value,
    pub row_count: u64,
    pub comparison: Comparison,
    /// Only meaningful when `comparison` is not a missing label; 0 otherwise
    pub difference: Difference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub column_a: String,
    pub column_b: String,
    pub kind: ColumnKind,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonResult {
    pub fn label(&self, row: &ComparisonRow) -> String {
        row.comparison.label(&self.column_a, &self.column_b)
    }

    /// Counts per comparison label, ready for suppression
    pub fn summarize(&self) -> GroupedCount {
        let mut out = GroupedCount::new(vec!["comparison".to_string()]);
        let mut totals: Vec<(Comparison, u64)> = Vec::new();
        for row in &self.rows {
            match totals.iter_mut().find(|(c, _)| *c == row.comparison) {
                Some((_, n)) => *n += row.row_count,
                None => totals.push((row.comparison, row.row_count)),
            }
        }
        totals.sort_by_key(|(c, _)| *c);
        for (comparison, n) in totals {
            let label = comparison.label(&self.column_a, &self.column_b);
            out.rows.push(GroupedRow::new(vec![Value::Text(label)], n));
        }
        out
    }

    /// Distribution of non-negative differences below `max_exclusive`,
    /// ready for suppression. Rows with a missing side are left out.
    pub fn difference_histogram(&self, max_exclusive: Option<i64>) -> GroupedCount {
        let mut out = GroupedCount::new(vec!["difference".to_string()]);
        for row in self.non_negative_differences(max_exclusive) {
            out.rows
                .push(GroupedRow::new(vec![row.difference.to_value()], row.row_count));
        }
        out.normalize();
        out
    }

    /// Percentiles of non-negative differences, each weighted by its row
    /// count. Rows with a missing side are left out.
    pub fn difference_percentiles(&self, max_exclusive: Option<i64>) -> Option<PercentileSummary> {
        let weighted: Vec<(f64, u64)> = self
            .non_negative_differences(max_exclusive)
            .map(|row| (row.difference.as_f64(), row.row_count))
            .collect();
        PercentileSummary::from_weighted(&weighted)
    }

    fn non_negative_differences(
        &self,
        max_exclusive: Option<i64>,
    ) -> impl Iterator<Item = &ComparisonRow> + '_ {
        self.rows.iter().filter(move |row| {
            if row.comparison.is_missing() {
                return false;
            }
            match row.difference {
                Difference::Integer(d) => d >= 0 && max_exclusive.map_or(true, |m| d < m),
                Difference::Float(d) => d >= 0.0 && max_exclusive.map_or(true, |m| d < m as f64),
            }
        })
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec![
            self.column_a.clone(),
            self.column_b.clone(),
            ROW_COUNT_COLUMN.to_string(),
            "difference".to_string(),
            "comparison".to_string(),
        ]);
        for row in &self.rows {
            table.rows.push(vec![
                row.a.clone(),
                row.b.clone(),
                Value::Integer(row.row_count as i64),
                row.difference.to_value(),
                Value::Text(self.label(row)),
            ]);
        }
        table
    }
}

/// Both sides must agree; an all-missing column takes the other side's kind
fn resolve_kind(
    column_a: &str,
    kind_a: ColumnKind,
    column_b: &str,
    kind_b: ColumnKind,
) -> Result<ColumnKind> {
    use ColumnKind::*;

    match (kind_a, kind_b) {
        (Numeric, Numeric) | (Numeric, Empty) | (Empty, Numeric) => Ok(Numeric),
        (Date, Date) | (Date, Empty) | (Empty, Date) => Ok(Date),
        (Empty, Empty) => Ok(Empty),
        _ => Err(Error::IncompatibleColumnTypes {
            column_a: column_a.to_string(),
            kind_a,
            column_b: column_b.to_string(),
            kind_b,
        }),
    }
}

fn coerce_column(values: Vec<Value>, column: &str) -> Vec<Value> {
    let mut coerced = 0usize;
    let out: Vec<Value> = values
        .into_iter()
        .map(|v| {
            let d = coerce_date(&v);
            if d.is_null() && !normalize_missing(v).is_null() {
                coerced += 1;
            }
            d
        })
        .collect();
    if coerced > 0 {
        warn!(column, coerced, "Unparsable dates treated as missing");
    }
    out
}

fn difference(a: &Value, b: &Value, kind: ColumnKind) -> Difference {
    match kind {
        ColumnKind::Date => match (a.as_date(), b.as_date()) {
            (Some(x), Some(y)) => Difference::Integer((y - x).num_days()),
            _ => Difference::Integer(0),
        },
        _ => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Difference::Integer(y.saturating_sub(*x)),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Difference::Float(y - x),
                _ => Difference::Integer(0),
            },
        },
    }
}

/// Compare two columns of a grouped count table row by row.
///
/// Both columns must be numeric or both date-like (date strings are coerced;
/// unparsable ones become missing). `columns` must name exactly two columns.
pub fn compare_columns(table: &GroupedCount, columns: &[&str]) -> Result<ComparisonResult> {
    if columns.len() != 2 {
        return Err(Error::InvalidArgument(format!(
            "comparison needs exactly 2 columns, got {}",
            columns.len()
        )));
    }
    let (column_a, column_b) = (columns[0], columns[1]);

    let index = |name: &str| {
        table.column_index(name).ok_or_else(|| {
            Error::InvalidArgument(format!("column '{}' is not in the result", name))
        })
    };
    let idx_a = index(column_a)?;
    let idx_b = index(column_b)?;

    let mut values_a: Vec<Value> = table.rows.iter().map(|r| r.keys[idx_a].clone()).collect();
    let mut values_b: Vec<Value> = table.rows.iter().map(|r| r.keys[idx_b].clone()).collect();

    let kind = resolve_kind(column_a, infer_kind(&values_a), column_b, infer_kind(&values_b))?;

    if kind == ColumnKind::Date {
        values_a = coerce_column(values_a, column_a);
        values_b = coerce_column(values_b, column_b);
    }

    let rows = values_a
        .into_iter()
        .zip(values_b)
        .zip(table.rows.iter())
        .map(|((a, b), row)| {
            let comparison = Comparison::evaluate(&a, &b, kind);
            let difference = if comparison.is_missing() {
                Difference::Integer(0)
            } else {
                difference(&a, &b, kind)
            };
            ComparisonRow {
                a,
                b,
                row_count: row.row_count,
                comparison,
                difference,
            }
        })
        .collect();

    Ok(ComparisonResult {
        column_a: column_a.to_string(),
        column_b: column_b.to_string(),
        kind,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn two_column(rows: Vec<(Value, Value, u64)>) -> GroupedCount {
        let mut t = GroupedCount::new(vec!["A".to_string(), "B".to_string()]);
        for (a, b, n) in rows {
            t.rows.push(GroupedRow::new(vec![a, b], n));
        }
        t
    }

    #[test]
    fn test_date_comparison() {
        let table = two_column(vec![
            (text("2021-01-10"), text("2021-01-15"), 20),
            (Value::Null, text("2021-01-01"), 30),
            (text("2021-01-05"), Value::Null, 40),
        ]);

        let result = compare_columns(&table, &["A", "B"]).unwrap();

        assert_eq!(result.kind, ColumnKind::Date);
        let labels: Vec<String> = result.rows.iter().map(|r| result.label(r)).collect();
        assert_eq!(labels, vec!["A < B", "A is missing", "B is missing"]);
        assert_eq!(result.rows[0].difference, Difference::Integer(5));
        assert_eq!(result.rows[1].difference, Difference::Integer(0));
        assert_eq!(result.rows[2].difference, Difference::Integer(0));
    }

    #[test]
    fn test_both_missing_labels_a() {
        let table = two_column(vec![
            (Value::Null, Value::Null, 10),
            (text("2021-01-01"), text("2021-01-01"), 10),
        ]);
        let result = compare_columns(&table, &["A", "B"]).unwrap();
        assert_eq!(result.rows[0].comparison, Comparison::AMissing);
        assert_eq!(result.rows[1].comparison, Comparison::Equal);
    }

    #[test]
    fn test_unparsable_date_becomes_missing() {
        let table = two_column(vec![
            (text("2021-02-30"), text("2021-03-01"), 10),
            (text("2021-03-10"), text("2021-03-01"), 10),
            (text("2021-03-10"), text("2021-04-01"), 10),
        ]);
        let result = compare_columns(&table, &["A", "B"]).unwrap();
        assert_eq!(result.rows[0].comparison, Comparison::AMissing);
        assert_eq!(result.rows[0].a, Value::Null);
        assert_eq!(result.rows[1].comparison, Comparison::Greater);
        assert_eq!(result.rows[1].difference, Difference::Integer(-9));
    }

    #[test]
    fn test_numeric_difference_is_elementwise() {
        let table = two_column(vec![
            (Value::Integer(3), Value::Integer(10), 10),
            (Value::Integer(7), Value::Integer(7), 10),
            (Value::Float(2.5), Value::Integer(1), 10),
            (Value::Integer(1), Value::Null, 10),
        ]);
        let result = compare_columns(&table, &["A", "B"]).unwrap();

        assert_eq!(result.kind, ColumnKind::Numeric);
        assert_eq!(result.rows[0].difference, Difference::Integer(7));
        assert_eq!(result.rows[0].comparison, Comparison::Less);
        assert_eq!(result.rows[1].comparison, Comparison::Equal);
        assert_eq!(result.rows[2].difference, Difference::Float(-1.5));
        assert_eq!(result.rows[2].comparison, Comparison::Greater);
        assert_eq!(result.rows[3].comparison, Comparison::BMissing);
        assert_eq!(result.rows[3].difference, Difference::Integer(0));
    }

    #[test]
    fn test_incompatible_types() {
        let table = two_column(vec![
            (Value::Integer(3), text("routine"), 10),
            (Value::Integer(4), text("urgent"), 10),
        ]);
        let err = compare_columns(&table, &["A", "B"]).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompatibleColumnTypes {
                kind_a: ColumnKind::Numeric,
                kind_b: ColumnKind::Text,
                ..
            }
        ));
    }

    #[test]
    fn test_numeric_against_date_is_incompatible() {
        let table = two_column(vec![(Value::Integer(3), text("2021-01-01"), 10)]);
        assert!(matches!(
            compare_columns(&table, &["A", "B"]),
            Err(Error::IncompatibleColumnTypes { .. })
        ));
    }

    #[test]
    fn test_wrong_column_count() {
        let table = two_column(vec![]);
        assert!(matches!(
            compare_columns(&table, &["A", "B", "C"]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            compare_columns(&table, &["A"]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_column() {
        let table = two_column(vec![]);
        assert!(matches!(
            compare_columns(&table, &["A", "Due_Date"]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_summarize_by_label() {
        let table = two_column(vec![
            (text("2021-01-10"), text("2021-01-15"), 20),
            (text("2021-01-11"), text("2021-01-12"), 7),
            (text("2021-01-05"), Value::Null, 40),
        ]);
        let summary = compare_columns(&table, &["A", "B"]).unwrap().summarize();

        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.rows[0].keys, vec![text("A < B")]);
        assert_eq!(summary.rows[0].row_count, 27);
        assert_eq!(summary.rows[1].keys, vec![text("B is missing")]);
    }

    #[test]
    fn test_difference_histogram() {
        let table = two_column(vec![
            (text("2021-01-01"), text("2021-01-06"), 20),
            (text("2021-02-01"), text("2021-02-06"), 15),
            (text("2021-01-10"), text("2021-01-01"), 9),
            (text("2021-01-01"), text("2021-12-01"), 9),
            (text("2021-01-01"), Value::Null, 50),
        ]);
        let hist = compare_columns(&table, &["A", "B"])
            .unwrap()
            .difference_histogram(Some(53));

        assert_eq!(hist.rows, vec![GroupedRow::new(vec![Value::Integer(5)], 35)]);
    }

    #[test]
    fn test_difference_percentiles_weighted_by_count() {
        let table = two_column(vec![
            (text("2021-01-01"), text("2021-01-06"), 20),
            (text("2021-02-01"), text("2021-02-11"), 10),
            (text("2021-01-10"), text("2021-01-01"), 10),
            (text("2021-01-01"), text("2021-12-01"), 10),
            (text("2021-01-01"), Value::Null, 50),
        ]);
        let result = compare_columns(&table, &["A", "B"]).unwrap();

        let all = result.difference_percentiles(None).unwrap();
        assert_eq!(all.count, 40);
        assert_eq!(all.median, 7.5);
        assert!((all.mean - 88.5).abs() < 1e-10);
        assert_eq!(all.max, 334.0);

        let within_year = result.difference_percentiles(Some(53)).unwrap();
        assert_eq!(within_year.count, 30);
        assert_eq!(within_year.median, 5.0);
    }

    #[test]
    fn test_difference_percentiles_all_missing() {
        let table = two_column(vec![(text("2021-01-01"), Value::Null, 50)]);
        let result = compare_columns(&table, &["A", "B"]).unwrap();
        assert!(result.difference_percentiles(None).is_none());
    }

    #[test]
    fn test_to_table_columns() {
        let table = two_column(vec![(Value::Integer(1), Value::Integer(2), 10)]);
        let out = compare_columns(&table, &["A", "B"]).unwrap().to_table();
        assert_eq!(out.columns, vec!["A", "B", "row_count", "difference", "comparison"]);
        assert_eq!(out.rows[0][4], text("A < B"));
    }
}
