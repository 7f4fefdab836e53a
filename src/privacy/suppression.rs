use tracing::debug;

use crate::error::Error;
use crate::types::{
    compare_keys, DisclosureOptions, GroupedCount, GroupedRow, Result, SuppressedTable,
};

use super::rounding::round_to_unit;

/// Check if a count falls in the small-cell range
pub fn is_small_cell(count: u64, threshold: u64) -> bool {
    count <= threshold
}

/// Check that suppression and rounding can be applied to their own output.
///
/// The smallest visible count must still round above the threshold, or a
/// second pass would suppress groups the first pass showed.
pub fn validate_options(options: &DisclosureOptions) -> Result<()> {
    if options.rounding_unit == 0 {
        return Err(Error::InvalidArgument(
            "rounding unit must be at least 1".to_string(),
        ));
    }
    let smallest_visible = options.threshold.saturating_add(1);
    if round_to_unit(smallest_visible, options.rounding_unit) <= options.threshold {
        return Err(Error::InvalidArgument(format!(
            "a count of {} rounds to {} with unit {}, which is not above the threshold of {}",
            smallest_visible,
            round_to_unit(smallest_visible, options.rounding_unit),
            options.rounding_unit,
            options.threshold
        )));
    }
    Ok(())
}

/// Apply small-cell suppression and rounding to a grouped count table.
///
/// Groups with `row_count <= threshold` are dropped unless
/// `keep_suppressed` is set, in which case they stay and go through the same
/// rounding as every other group (a small count usually rounds to 0, which is
/// not a disclosure-free signal). Raw counts are not carried into the output.
pub fn suppress_and_round(table: &GroupedCount, options: &DisclosureOptions) -> SuppressedTable {
    let mut rows: Vec<GroupedRow> = Vec::with_capacity(table.rows.len());
    let mut suppressed_groups = 0usize;

    for row in &table.rows {
        let small = is_small_cell(row.row_count, options.threshold);
        if small {
            suppressed_groups += 1;
            if !options.keep_suppressed {
                continue;
            }
        }
        rows.push(GroupedRow {
            keys: row.keys.clone(),
            row_count: round_to_unit(row.row_count, options.rounding_unit),
        });
    }

    debug!(
        groups = table.rows.len(),
        suppressed = suppressed_groups,
        kept = rows.len(),
        "Applied small-cell suppression"
    );

    SuppressedTable {
        group_columns: table.group_columns.clone(),
        rows,
        suppressed_groups,
        options: *options,
    }
}

/// Suppress and round, then order by count descending (ties by key) and keep
/// the `top_n` most frequent groups.
pub fn frequency_distribution(
    table: &GroupedCount,
    options: &DisclosureOptions,
    top_n: Option<usize>,
) -> SuppressedTable {
    let mut out = suppress_and_round(table, options);
    out.rows.sort_by(|a, b| {
        b.row_count
            .cmp(&a.row_count)
            .then_with(|| compare_keys(&a.keys, &b.keys))
    });
    if let Some(n) = top_n {
        out.rows.truncate(n);
    }
    out
}
