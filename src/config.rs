//! Report configuration.
//!
//! A report is a list of steps run against one database. Table names, filters
//! and disclosure settings are passed explicitly to every step.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::periods::{DateWindow, Period};
use crate::privacy::validate_options;
use crate::query::{validate_identifier, AggregateQuery};
use crate::types::{DisclosureOptions, Result};

/// Environment variable holding the connection descriptor
pub const DATABASE_ENV: &str = "FULL_DATABASE_URL";

/// One analysis step of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportStep {
    /// Row count of a whole table
    TotalCount {
        #[serde(default)]
        title: Option<String>,
        table: String,
        #[serde(default)]
        filter: Option<String>,
    },

    /// Suppressed counts per group, optionally windowed and rolled up
    GroupedCounts {
        #[serde(default)]
        title: Option<String>,
        #[serde(flatten)]
        query: AggregateQuery,
        #[serde(default)]
        window: Option<DateWindow>,
        #[serde(default)]
        rollup: Option<Period>,
    },

    /// Compare two columns of the same table
    Compare {
        #[serde(default)]
        title: Option<String>,
        #[serde(flatten)]
        query: AggregateQuery,
        /// Emit every column pair instead of the per-label summary
        #[serde(default)]
        detail: bool,
        /// Also emit the distribution of differences below this value
        #[serde(default)]
        histogram_max: Option<i64>,
        /// Also emit count-weighted percentiles of non-negative differences
        #[serde(default)]
        percentiles: bool,
    },

    /// Most common values of one column
    Frequency {
        #[serde(default)]
        title: Option<String>,
        #[serde(flatten)]
        query: AggregateQuery,
        #[serde(default)]
        top_n: Option<usize>,
    },

    /// Percentile summary of suppressed counts per group
    Percentiles {
        #[serde(default)]
        title: Option<String>,
        #[serde(flatten)]
        query: AggregateQuery,
        #[serde(default)]
        window: Option<DateWindow>,
    },

    /// Pathways counted by the latest reporting date they appear on
    PathwayEndDates {
        #[serde(default)]
        title: Option<String>,
        table: String,
        id_column: String,
        date_column: String,
        #[serde(default)]
        filter: Option<String>,
        #[serde(default)]
        window: Option<DateWindow>,
    },
}

impl ReportStep {
    /// Check the step's argument shape without touching the database
    pub fn validate(&self) -> Result<()> {
        match self {
            ReportStep::TotalCount { table, .. } => validate_identifier(table, "table"),
            ReportStep::GroupedCounts { query, .. }
            | ReportStep::Frequency { query, .. }
            | ReportStep::Percentiles { query, .. } => query.validate(),
            ReportStep::Compare { query, .. } => {
                if query.group_columns.len() != 2 {
                    return Err(Error::InvalidArgument(format!(
                        "comparison needs exactly 2 columns, got {}",
                        query.group_columns.len()
                    )));
                }
                query.validate()
            }
            ReportStep::PathwayEndDates {
                table,
                id_column,
                date_column,
                ..
            } => {
                validate_identifier(table, "table")?;
                validate_identifier(id_column, "column")?;
                validate_identifier(date_column, "column")
            }
        }
    }

    /// Fill in the report-wide filter where the step has none
    pub fn apply_default_filter(&mut self, default: &str) {
        let filter = match self {
            ReportStep::TotalCount { filter, .. } | ReportStep::PathwayEndDates { filter, .. } => {
                filter
            }
            ReportStep::GroupedCounts { query, .. }
            | ReportStep::Compare { query, .. }
            | ReportStep::Frequency { query, .. }
            | ReportStep::Percentiles { query, .. } => &mut query.filter,
        };
        if filter.is_none() {
            *filter = Some(default.to_string());
        }
    }
}

/// A full report definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Filter applied to every step without its own, e.g.
    /// `WHERE Week_Ending_Date IS NOT NULL`
    #[serde(default)]
    pub schema_filter: Option<String>,

    #[serde(default)]
    pub disclosure: DisclosureOptions,

    pub steps: Vec<ReportStep>,
}

impl ReportConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        if let Some(default) = config.schema_filter.clone() {
            for step in &mut config.steps {
                step.apply_default_filter(&default);
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::Config("report has no steps".to_string()));
        }
        validate_options(&self.disclosure)
            .map_err(|e| Error::Config(format!("disclosure: {}", e)))?;
        for (idx, step) in self.steps.iter().enumerate() {
            step.validate()
                .map_err(|e| Error::Config(format!("step {}: {}", idx + 1, e)))?;
        }
        Ok(())
    }
}
