use tracing::{info, warn};

use crate::config::{ReportConfig, ReportStep};
use crate::extract::{extract_grouped_counts, pathway_end_dates, total_count};
use crate::periods::rollup_by_period;
use crate::privacy::{
    compare_columns, frequency_distribution, suppress_and_round, validate_options,
};
use crate::query::QueryExecutor;
use crate::stats::PercentileSummary;
use crate::types::{DisclosureOptions, GroupedCount, GroupedRow, Result, Table, Value};

/// A titled result ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub table: Table,
}

impl Section {
    fn new(title: String, table: Table) -> Self {
        Self { title, table }
    }
}

fn title_or(title: &Option<String>, fallback: impl FnOnce() -> String) -> String {
    title.clone().unwrap_or_else(fallback)
}

/// Run one step. Every count leaving this function has been through
/// suppression and rounding.
pub fn run_step(
    executor: &mut dyn QueryExecutor,
    step: &ReportStep,
    options: &DisclosureOptions,
) -> Result<Vec<Section>> {
    validate_options(options)?;
    step.validate()?;

    match step {
        ReportStep::TotalCount {
            title,
            table,
            filter,
        } => {
            let n = total_count(executor, table, filter.as_deref())?;
            let mut grouped = GroupedCount::new(vec!["table".to_string()]);
            grouped
                .rows
                .push(GroupedRow::new(vec![Value::Text(table.clone())], n));
            let out = suppress_and_round(&grouped, options);
            let title = title_or(title, || format!("Total rows: {}", table));
            Ok(vec![Section::new(title, out.to_table())])
        }

        ReportStep::GroupedCounts {
            title,
            query,
            window,
            rollup,
        } => {
            let grouped = extract_grouped_counts(executor, query)?;
            let mut out = suppress_and_round(&grouped, options);
            if let Some(window) = window {
                out.rows = window.filter_rows(out.rows);
            }
            let table = match rollup {
                Some(period) => rollup_by_period(&out.rows, *period).to_table(),
                None => out.to_table(),
            };
            let title = title_or(title, || {
                format!("{} by {}", query.count_expression, query.group_columns.join(", "))
            });
            Ok(vec![Section::new(title, table)])
        }

        ReportStep::Compare {
            title,
            query,
            detail,
            histogram_max,
            percentiles,
        } => {
            let grouped = extract_grouped_counts(executor, query)?;
            let visible = suppress_and_round(&grouped, options).to_grouped();
            let columns: Vec<&str> = query.group_columns.iter().map(String::as_str).collect();
            let result = compare_columns(&visible, &columns)?;

            let title = title_or(title, || format!("Compare {}", columns.join(" and ")));
            let table = if *detail {
                result.to_table()
            } else {
                result.summarize().to_table()
            };
            let mut sections = vec![Section::new(title.clone(), table)];

            if let Some(max) = histogram_max {
                let hist = suppress_and_round(&result.difference_histogram(Some(*max)), options);
                sections.push(Section::new(
                    format!("{}: distribution of differences", title),
                    hist.to_table(),
                ));
            }
            if *percentiles {
                let title = format!("{}: percentiles of differences", title);
                let table = match result.difference_percentiles(None) {
                    Some(summary) => summary.to_table(),
                    None => {
                        warn!(%title, "No visible differences to summarise");
                        Table::new(vec!["statistic".to_string(), "value".to_string()])
                    }
                };
                sections.push(Section::new(title, table));
            }
            Ok(sections)
        }

        ReportStep::Frequency {
            title,
            query,
            top_n,
        } => {
            let grouped = extract_grouped_counts(executor, query)?;
            let out = frequency_distribution(&grouped, options, *top_n);
            let title = title_or(title, || {
                format!("Frequency distribution: {}", query.group_columns.join(", "))
            });
            Ok(vec![Section::new(title, out.to_table())])
        }

        ReportStep::Percentiles {
            title,
            query,
            window,
        } => {
            let grouped = extract_grouped_counts(executor, query)?;
            let mut out = suppress_and_round(&grouped, options);
            if let Some(window) = window {
                out.rows = window.filter_rows(out.rows);
            }
            let values: Vec<f64> = out.rows.iter().map(|r| r.row_count as f64).collect();
            let title = title_or(title, || {
                format!("Percentiles of {} per {}", query.count_expression, query.group_columns.join(", "))
            });
            let table = match PercentileSummary::from_values(&values) {
                Some(summary) => summary.to_table(),
                None => {
                    warn!(%title, "No visible groups to summarise");
                    Table::new(vec!["statistic".to_string(), "value".to_string()])
                }
            };
            Ok(vec![Section::new(title, table)])
        }

        ReportStep::PathwayEndDates {
            title,
            table,
            id_column,
            date_column,
            filter,
            window,
        } => {
            let grouped =
                pathway_end_dates(executor, table, id_column, date_column, filter.as_deref())?;
            let mut out = suppress_and_round(&grouped, options);
            if let Some(window) = window {
                out.rows = window.filter_rows(out.rows);
            }
            let title = title_or(title, || format!("Pathways by latest {}", date_column));
            Ok(vec![Section::new(title, out.to_table())])
        }
    }
}

/// Run every step of a report in order; the first failure stops the run
pub fn run_report(executor: &mut dyn QueryExecutor, config: &ReportConfig) -> Result<Vec<Section>> {
    let mut sections = Vec::new();
    for (idx, step) in config.steps.iter().enumerate() {
        info!(step = idx + 1, total = config.steps.len(), "Running report step");
        sections.extend(run_step(executor, step, &config.disclosure)?);
    }
    Ok(sections)
}
