use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ReportStep, DATABASE_ENV};
use crate::output::OutputFormat;
use crate::periods::{DateWindow, Period};
use crate::query::{AggregateQuery, LatestRows};
use crate::types::{
    DisclosureOptions, DEFAULT_COUNT_EXPRESSION, DEFAULT_DATE_COLUMN, DEFAULT_ROUNDING_UNIT,
    DEFAULT_SUPPRESSION_THRESHOLD,
};

/// Disclosure-controlled data-quality reporting for waiting-list tables
#[derive(Parser, Debug)]
#[command(name = "wl-quality")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database connection descriptor (SQLite path)
    #[arg(long, global = true, env = DATABASE_ENV, hide_env_values = true)]
    pub database: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, global = true)]
    pub out: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Only log warnings and errors
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,

    #[command(flatten)]
    pub disclosure: DisclosureArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct DisclosureArgs {
    /// Counts at or below this value are suppressed
    #[arg(long, global = true, default_value_t = DEFAULT_SUPPRESSION_THRESHOLD)]
    pub threshold: u64,

    /// Round visible counts to a multiple of this value
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_ROUNDING_UNIT,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rounding_unit: u64,

    /// Keep suppressed groups (their rounded counts are near zero, not true zero)
    #[arg(long, global = true, default_value_t = false)]
    pub keep_suppressed: bool,
}

impl DisclosureArgs {
    pub fn options(&self) -> DisclosureOptions {
        DisclosureOptions {
            threshold: self.threshold,
            rounding_unit: self.rounding_unit,
            keep_suppressed: self.keep_suppressed,
        }
    }
}

/// Exclusive date bounds on the first grouping column
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Keep groups dated after this day
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Keep groups dated before this day
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

impl WindowArgs {
    fn window(&self) -> Option<DateWindow> {
        DateWindow::from_bounds(self.start, self.end)
    }
}

/// Restrict to each id's rows at its latest date
#[derive(Args, Debug, Clone)]
pub struct LatestArgs {
    /// Only count rows at the latest date of this id column, e.g. Patient_ID
    #[arg(long)]
    pub latest_by: Option<String>,

    /// Date column whose maximum picks the latest rows
    #[arg(long, default_value = DEFAULT_DATE_COLUMN)]
    pub latest_date_column: String,
}

impl LatestArgs {
    fn apply(&self, query: AggregateQuery) -> AggregateQuery {
        match &self.latest_by {
            Some(id) => query.with_latest_only(LatestRows::new(id, &self.latest_date_column)),
            None => query,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count all rows of a table
    Total {
        #[arg(short, long)]
        table: String,

        #[arg(long)]
        filter: Option<String>,
    },

    /// Suppressed counts per group (one or two columns)
    Counts {
        #[arg(short, long)]
        table: String,

        /// Grouping column; repeat for a second one
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,

        /// Count expression, e.g. "count(distinct Patient_ID)"
        #[arg(long, default_value = DEFAULT_COUNT_EXPRESSION)]
        count: String,

        #[arg(long)]
        filter: Option<String>,

        #[command(flatten)]
        window: WindowArgs,

        /// Sum counts by month or year of the first column
        #[arg(long, value_enum)]
        rollup: Option<Period>,

        #[command(flatten)]
        latest: LatestArgs,
    },

    /// Compare two columns (numbers or dates)
    Compare {
        #[arg(short, long)]
        table: String,

        /// The two columns to compare, A then B
        #[arg(short, long = "column", required = true)]
        columns: Vec<String>,

        #[arg(long)]
        filter: Option<String>,

        /// Show every value pair instead of counts per outcome
        #[arg(long, default_value_t = false)]
        detail: bool,

        /// Also show the distribution of differences below this value
        #[arg(long)]
        histogram_max: Option<i64>,

        /// Also show percentiles of the non-negative differences
        #[arg(long, default_value_t = false)]
        percentiles: bool,

        #[command(flatten)]
        latest: LatestArgs,
    },

    /// Most common values of a column
    Freq {
        #[arg(short, long)]
        table: String,

        #[arg(short, long)]
        column: String,

        #[arg(long)]
        filter: Option<String>,

        /// Number of values to show
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Percentile summary of suppressed counts per group
    Percentiles {
        #[arg(short, long)]
        table: String,

        #[arg(short, long)]
        column: String,

        #[arg(long, default_value = DEFAULT_COUNT_EXPRESSION)]
        count: String,

        #[arg(long)]
        filter: Option<String>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Count pathways by the latest reporting date they appear on
    EndDates {
        #[arg(short, long)]
        table: String,

        #[arg(long, default_value = "PSEUDO_PATIENT_PATHWAY_IDENTIFIER")]
        id_column: String,

        #[arg(long, default_value = DEFAULT_DATE_COLUMN)]
        date_column: String,

        #[arg(long)]
        filter: Option<String>,

        #[command(flatten)]
        window: WindowArgs,
    },

    /// Run every step of a JSON report configuration
    Report {
        /// Report configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn query(table: &str, columns: &[String], count: &str, filter: Option<String>) -> AggregateQuery {
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let query = AggregateQuery::new(table, &columns).with_count(count);
    match filter {
        Some(filter) => query.with_filter(&filter),
        None => query,
    }
}

impl Commands {
    /// The report step equivalent to a single-step command; None for `report`
    pub fn to_step(&self) -> Option<ReportStep> {
        let step = match self {
            Commands::Total { table, filter } => ReportStep::TotalCount {
                title: None,
                table: table.clone(),
                filter: filter.clone(),
            },
            Commands::Counts {
                table,
                columns,
                count,
                filter,
                window,
                rollup,
                latest,
            } => ReportStep::GroupedCounts {
                title: None,
                query: latest.apply(query(table, columns, count, filter.clone())),
                window: window.window(),
                rollup: *rollup,
            },
            Commands::Compare {
                table,
                columns,
                filter,
                detail,
                histogram_max,
                percentiles,
                latest,
            } => ReportStep::Compare {
                title: None,
                query: latest.apply(query(
                    table,
                    columns,
                    DEFAULT_COUNT_EXPRESSION,
                    filter.clone(),
                )),
                detail: *detail,
                histogram_max: *histogram_max,
                percentiles: *percentiles,
            },
            Commands::Freq {
                table,
                column,
                filter,
                top,
            } => ReportStep::Frequency {
                title: None,
                query: query(
                    table,
                    std::slice::from_ref(column),
                    DEFAULT_COUNT_EXPRESSION,
                    filter.clone(),
                ),
                top_n: Some(*top),
            },
            Commands::Percentiles {
                table,
                column,
                count,
                filter,
                window,
            } => ReportStep::Percentiles {
                title: None,
                query: query(table, std::slice::from_ref(column), count, filter.clone()),
                window: window.window(),
            },
            Commands::EndDates {
                table,
                id_column,
                date_column,
                filter,
                window,
            } => ReportStep::PathwayEndDates {
                title: None,
                table: table.clone(),
                id_column: id_column.clone(),
                date_column: date_column.clone(),
                filter: filter.clone(),
                window: window.window(),
            },
            Commands::Report { .. } => return None,
        };
        Some(step)
    }
}
