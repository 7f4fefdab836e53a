use tracing::{info, warn};

use crate::error::Error;
use crate::inference::{coerce_date, infer_kind, normalize_missing};
use crate::query::{pathway_end_dates_sql, total_count_sql, AggregateQuery, QueryExecutor};
use crate::types::{ColumnKind, GroupedCount, GroupedRow, Result, Table, Value, ROW_COUNT_COLUMN};

/// Run a grouped count extraction.
///
/// The argument shape is validated before the query runs. Exactly one query
/// is issued; no suppression or rounding is applied here.
pub fn extract_grouped_counts(
    executor: &mut dyn QueryExecutor,
    query: &AggregateQuery,
) -> Result<GroupedCount> {
    let sql = query.to_sql()?;
    let table = executor.execute(&sql)?;
    let grouped = grouped_from_table(table, &query.group_columns, query.coerce_dates)?;
    info!(
        table = %query.table,
        columns = ?query.group_columns,
        groups = grouped.rows.len(),
        "Extracted grouped counts"
    );
    Ok(grouped)
}

/// Total number of rows in a table, optionally filtered
pub fn total_count(
    executor: &mut dyn QueryExecutor,
    table: &str,
    filter: Option<&str>,
) -> Result<u64> {
    let sql = total_count_sql(table, filter)?;
    let result = executor.execute(&sql)?;
    let idx = count_column(&result, 0)?;
    let row = result
        .rows
        .first()
        .ok_or_else(|| Error::InvalidInput("count query returned no rows".to_string()))?;
    parse_count(&row[idx])
}

/// Count pathways by the latest reporting date they appear on
pub fn pathway_end_dates(
    executor: &mut dyn QueryExecutor,
    table: &str,
    id_column: &str,
    date_column: &str,
    filter: Option<&str>,
) -> Result<GroupedCount> {
    let sql = pathway_end_dates_sql(table, id_column, date_column, filter)?;
    let result = executor.execute(&sql)?;
    let mut grouped = grouped_from_table(result, &["max_date".to_string()], true)?;
    grouped.group_columns = vec![format!("Max_{}", date_column)];
    Ok(grouped)
}

fn count_column(table: &Table, group_len: usize) -> Result<usize> {
    if let Some(idx) = table.column_index(ROW_COUNT_COLUMN) {
        return Ok(idx);
    }
    if table.columns.len() == group_len + 1 {
        return Ok(group_len);
    }
    Err(Error::InvalidInput(format!(
        "result has no '{}' column",
        ROW_COUNT_COLUMN
    )))
}

fn parse_count(value: &Value) -> Result<u64> {
    match value {
        Value::Integer(i) if *i >= 0 => Ok(*i as u64),
        Value::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Ok(*f as u64),
        Value::Text(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidInput(format!("row_count '{}' is not a count", s))),
        other => Err(Error::InvalidInput(format!(
            "row_count '{}' is not a non-negative integer",
            other
        ))),
    }
}

/// Convert a raw result set into a GroupedCount. Group columns are taken
/// positionally, in query order.
fn grouped_from_table(
    table: Table,
    group_columns: &[String],
    coerce_dates: bool,
) -> Result<GroupedCount> {
    let group_len = group_columns.len();
    if table.columns.len() < group_len + 1 {
        return Err(Error::InvalidInput(format!(
            "expected {} columns in result, got {}",
            group_len + 1,
            table.columns.len()
        )));
    }
    let count_idx = count_column(&table, group_len)?;

    let mut grouped = GroupedCount::new(group_columns.to_vec());
    for row in table.rows {
        let row_count = parse_count(&row[count_idx])?;
        let keys: Vec<Value> = row
            .into_iter()
            .take(group_len)
            .map(normalize_missing)
            .collect();
        grouped.rows.push(GroupedRow::new(keys, row_count));
    }

    if coerce_dates {
        for (idx, column) in group_columns.iter().enumerate() {
            coerce_date_column(&mut grouped, idx, column);
        }
    }

    grouped.sort_rows();
    Ok(grouped)
}

fn coerce_date_column(grouped: &mut GroupedCount, idx: usize, column: &str) {
    let kind = infer_kind(grouped.rows.iter().map(|r| &r.keys[idx]));
    if kind != ColumnKind::Date {
        return;
    }

    let mut coerced = 0usize;
    for row in &mut grouped.rows {
        let value = coerce_date(&row.keys[idx]);
        if value.is_null() && !row.keys[idx].is_null() {
            coerced += 1;
        }
        row.keys[idx] = value;
    }
    if coerced > 0 {
        warn!(column, coerced, "Unparsable dates treated as missing");
    }
}
