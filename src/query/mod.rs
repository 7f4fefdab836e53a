pub mod sqlite;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Result, Table, DEFAULT_COUNT_EXPRESSION, DEFAULT_DATE_COLUMN, ROW_COUNT_COLUMN};

pub use sqlite::SqliteExecutor;

/// Maximum number of grouping columns an extraction accepts
pub const MAX_GROUP_COLUMNS: usize = 2;

/// Alias of the outer table when restricting to each id's latest rows
const LATEST_ALIAS: &str = "latest_rows";

static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap()
});

static WHERE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^where(\s+|$)").unwrap());

/// Runs one query and returns the full result set
pub trait QueryExecutor {
    fn execute(&mut self, sql: &str) -> Result<Table>;
}

/// Check that a table or column name is a plain (optionally schema-qualified)
/// identifier
pub fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{} '{}' is not a valid identifier",
            what, name
        )))
    }
}

/// Build the WHERE clause for an optional filter predicate.
///
/// Accepts the predicate with or without a leading `WHERE`; blank filters
/// produce no clause.
pub fn where_clause(filter: Option<&str>) -> String {
    match filter_predicate(filter) {
        Some(predicate) => format!(" WHERE {}", predicate),
        None => String::new(),
    }
}

/// The filter predicate without any leading `WHERE`; None when blank
fn filter_predicate(filter: Option<&str>) -> Option<String> {
    let trimmed = filter.map(str::trim).filter(|f| !f.is_empty())?;
    let predicate = WHERE_PREFIX.replace(trimmed, "").trim().to_string();
    if predicate.is_empty() {
        None
    } else {
        Some(predicate)
    }
}

fn default_count_expression() -> String {
    DEFAULT_COUNT_EXPRESSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_date_column() -> String {
    DEFAULT_DATE_COLUMN.to_string()
}

/// Restricts an extraction to the rows carrying each id's latest date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRows {
    /// Patient or pathway identifier
    pub id_column: String,

    #[serde(default = "default_date_column")]
    pub date_column: String,
}

impl LatestRows {
    pub fn new(id_column: &str, date_column: &str) -> Self {
        Self {
            id_column: id_column.to_string(),
            date_column: date_column.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_identifier(&self.id_column, "id column")?;
        validate_identifier(&self.date_column, "date column")
    }

    /// Correlated condition on the outer table, aliased `latest_rows`
    fn condition(&self, table: &str) -> String {
        format!(
            "{date} = (SELECT max({date}) FROM {table} WHERE {id} = {alias}.{id})",
            date = self.date_column,
            table = table,
            id = self.id_column,
            alias = LATEST_ALIAS,
        )
    }
}

/// A grouped count extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    pub table: String,

    /// One or two grouping columns, in output order
    pub group_columns: Vec<String>,

    /// SQL aggregate producing the count, e.g. `count(distinct Patient_ID)`
    #[serde(default = "default_count_expression")]
    pub count_expression: String,

    #[serde(default)]
    pub filter: Option<String>,

    /// Parse date-like grouping columns into dates
    #[serde(default = "default_true")]
    pub coerce_dates: bool,

    /// Only count each id's rows at its latest date
    #[serde(default)]
    pub latest_only: Option<LatestRows>,
}

impl AggregateQuery {
    pub fn new(table: &str, group_columns: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            group_columns: group_columns.iter().map(|c| c.to_string()).collect(),
            count_expression: default_count_expression(),
            filter: None,
            coerce_dates: true,
            latest_only: None,
        }
    }

    pub fn with_count(mut self, count_expression: &str) -> Self {
        self.count_expression = count_expression.to_string();
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn with_latest_only(mut self, latest: LatestRows) -> Self {
        self.latest_only = Some(latest);
        self
    }

    /// Check the argument shape without touching the database
    pub fn validate(&self) -> Result<()> {
        if self.group_columns.is_empty() || self.group_columns.len() > MAX_GROUP_COLUMNS {
            return Err(Error::InvalidArgument(format!(
                "expected 1 to {} grouping columns, got {}; reduce the number of columns",
                MAX_GROUP_COLUMNS,
                self.group_columns.len()
            )));
        }
        validate_identifier(&self.table, "table")?;
        for column in &self.group_columns {
            validate_identifier(column, "column")?;
        }
        if let Some(latest) = &self.latest_only {
            latest.validate()?;
        }
        if self.count_expression.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "count expression is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_sql(&self) -> Result<String> {
        self.validate()?;
        let columns = self.group_columns.join(", ");
        let filter = filter_predicate(self.filter.as_deref());
        let (source, clause) = match (&self.latest_only, filter) {
            (None, None) => (self.table.clone(), String::new()),
            (None, Some(p)) => (self.table.clone(), format!(" WHERE {}", p)),
            (Some(latest), filter) => {
                let mut clause = format!(" WHERE {}", latest.condition(&self.table));
                if let Some(p) = filter {
                    clause.push_str(&format!(" AND ({})", p));
                }
                (format!("{} {}", self.table, LATEST_ALIAS), clause)
            }
        };
        Ok(format!(
            "SELECT {}, {} AS {} FROM {}{} GROUP BY {}",
            columns,
            self.count_expression.trim(),
            ROW_COUNT_COLUMN,
            source,
            clause,
            columns
        ))
    }
}

/// Total row count of a table
pub fn total_count_sql(table: &str, filter: Option<&str>) -> Result<String> {
    validate_identifier(table, "table")?;
    Ok(format!(
        "SELECT count(*) AS {} FROM {}{}",
        ROW_COUNT_COLUMN,
        table,
        where_clause(filter)
    ))
}

/// Number of pathways per latest reporting date
pub fn pathway_end_dates_sql(
    table: &str,
    id_column: &str,
    date_column: &str,
    filter: Option<&str>,
) -> Result<String> {
    validate_identifier(table, "table")?;
    validate_identifier(id_column, "column")?;
    validate_identifier(date_column, "column")?;
    Ok(format!(
        "SELECT max_date, count(*) AS {} FROM \
         (SELECT {id}, max({date}) AS max_date FROM {table}{filter} GROUP BY {id}) latest \
         GROUP BY max_date",
        ROW_COUNT_COLUMN,
        id = id_column,
        date = date_column,
        table = table,
        filter = where_clause(filter),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column_sql() {
        let q = AggregateQuery::new("WL_ClockStops", &["Week_Ending_Date"])
            .with_count("count(distinct Patient_ID)")
            .with_filter("WHERE Week_Ending_Date IS NOT NULL");

        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT Week_Ending_Date, count(distinct Patient_ID) AS row_count \
             FROM WL_ClockStops WHERE Week_Ending_Date IS NOT NULL GROUP BY Week_Ending_Date"
        );
    }

    #[test]
    fn test_two_column_sql_without_filter() {
        let q = AggregateQuery::new("WL_OpenPathways", &["Week_Ending_Date", "Due_Date"]);
        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT Week_Ending_Date, Due_Date, count(*) AS row_count \
             FROM WL_OpenPathways GROUP BY Week_Ending_Date, Due_Date"
        );
    }

    #[test]
    fn test_latest_only_sql() {
        let q = AggregateQuery::new("WL_ClockStops", &["Week_Ending_Date", "Due_Date"])
            .with_filter("where Due_Date IS NOT NULL")
            .with_latest_only(LatestRows::new("Patient_ID", "Week_Ending_Date"));

        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT Week_Ending_Date, Due_Date, count(*) AS row_count \
             FROM WL_ClockStops latest_rows \
             WHERE Week_Ending_Date = (SELECT max(Week_Ending_Date) FROM WL_ClockStops \
             WHERE Patient_ID = latest_rows.Patient_ID) AND (Due_Date IS NOT NULL) \
             GROUP BY Week_Ending_Date, Due_Date"
        );
    }

    #[test]
    fn test_latest_only_validates_id_column() {
        let q = AggregateQuery::new("WL_ClockStops", &["Week_Ending_Date"])
            .with_latest_only(LatestRows::new("Patient ID", "Week_Ending_Date"));
        assert!(matches!(q.to_sql(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_too_many_columns() {
        let q = AggregateQuery::new("t", &["a", "b", "c"]);
        assert!(matches!(q.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_no_columns() {
        let q = AggregateQuery::new("t", &[]);
        assert!(matches!(q.to_sql(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let q = AggregateQuery::new("t; drop table x", &["a"]);
        assert!(q.validate().is_err());
        let q = AggregateQuery::new("t", &["a b"]);
        assert!(q.validate().is_err());
        let q = AggregateQuery::new("dbo.WL_ClockStops", &["Week_Ending_Date"]);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_where_clause_normalization() {
        assert_eq!(where_clause(None), "");
        assert_eq!(where_clause(Some("   ")), "");
        assert_eq!(where_clause(Some("WHERE")), "");
        assert_eq!(where_clause(Some("x = 1")), " WHERE x = 1");
        assert_eq!(where_clause(Some("where x = 1")), " WHERE x = 1");
        assert_eq!(where_clause(Some("  WHERE   x = 1 ")), " WHERE x = 1");
    }

    #[test]
    fn test_total_count_sql() {
        assert_eq!(
            total_count_sql("WL_ClockStops", None).unwrap(),
            "SELECT count(*) AS row_count FROM WL_ClockStops"
        );
    }

    #[test]
    fn test_pathway_end_dates_sql() {
        let sql = pathway_end_dates_sql(
            "WL_OpenPathways",
            "PSEUDO_PATIENT_PATHWAY_IDENTIFIER",
            "Week_Ending_Date",
            Some("Week_Ending_Date IS NOT NULL"),
        )
        .unwrap();
        assert!(sql.contains("max(Week_Ending_Date) AS max_date"));
        assert!(sql.contains("WHERE Week_Ending_Date IS NOT NULL GROUP BY PSEUDO_PATIENT_PATHWAY_IDENTIFIER"));
        assert!(sql.ends_with("GROUP BY max_date"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let q: AggregateQuery =
            serde_json::from_str(r#"{"table": "WL_ClockStops", "group_columns": ["Waiting_List_Type"]}"#)
                .unwrap();
        assert_eq!(q.count_expression, "count(*)");
        assert!(q.coerce_dates);
        assert!(q.filter.is_none());
        assert!(q.latest_only.is_none());
    }

    #[test]
    fn test_deserialize_latest_only_default_date() {
        let q: AggregateQuery = serde_json::from_str(
            r#"{"table": "t", "group_columns": ["a"], "latest_only": {"id_column": "Patient_ID"}}"#,
        )
        .unwrap();
        assert_eq!(
            q.latest_only,
            Some(LatestRows::new("Patient_ID", "Week_Ending_Date"))
        );
    }
}
