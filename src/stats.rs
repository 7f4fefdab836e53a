use serde::Serialize;

use crate::types::{Table, Value};

/// Percentiles reported for a distribution
pub const REPORTED_PERCENTILES: [f64; 6] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0];

/// Welford's online algorithm for mean and variance in O(1) memory
#[derive(Debug, Clone)]
pub struct WelfordStats {
    count: u64,
    mean: f64,
    m2: f64, // Sum of squares of differences from current mean
    min: Option<f64>,
    max: Option<f64>,
}

impl WelfordStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: None,
            max: None,
        }
    }

    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1);
    }

    /// Add `value` as if it had been seen `weight` times
    pub fn update_weighted(&mut self, value: f64, weight: u64) {
        if weight == 0 {
            return;
        }
        self.count += weight;
        let delta = value - self.mean;
        self.mean += delta * (weight as f64 / self.count as f64);
        let delta2 = value - self.mean;
        self.m2 += weight as f64 * delta * delta2;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.mean)
        } else {
            None
        }
    }

    pub fn variance(&self) -> Option<f64> {
        if self.count > 1 {
            Some(self.m2 / (self.count - 1) as f64)
        } else {
            None
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(|v| v.sqrt())
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

impl Default for WelfordStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile of sorted data using midpoint interpolation: the average of
/// the two order statistics around rank `p/100 * (n-1)`.
pub fn percentile_midpoint(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some((sorted[lo] + sorted[hi]) / 2.0)
}

/// Midpoint percentile of values given with repeat counts, sorted by value.
/// Same result as expanding every value `weight` times.
pub fn weighted_percentile_midpoint(sorted: &[(f64, u64)], p: f64) -> Option<f64> {
    let total: u64 = sorted.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (total - 1) as f64;
    let lo = order_statistic(sorted, rank.floor() as u64)?;
    let hi = order_statistic(sorted, rank.ceil() as u64)?;
    Some((lo + hi) / 2.0)
}

// Value at zero-based position `idx` of the expanded sequence
fn order_statistic(sorted: &[(f64, u64)], idx: u64) -> Option<f64> {
    let mut seen = 0u64;
    for &(value, weight) in sorted {
        seen += weight;
        if idx < seen {
            return Some(value);
        }
    }
    None
}

/// Distribution summary printed for weekly counts and waiting times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileSummary {
    pub count: u64,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

impl PercentileSummary {
    /// Summarise a set of values; NaNs are ignored. Returns None when nothing
    /// is left to summarise.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut welford = WelfordStats::new();
        for &v in &sorted {
            welford.update(v);
        }

        let [p10, p25, median, p75, p90, p95] =
            REPORTED_PERCENTILES.map(|p| percentile_midpoint(&sorted, p).unwrap_or(f64::NAN));

        Some(Self {
            count: welford.count(),
            p10,
            p25,
            median,
            p75,
            p90,
            p95,
            mean: welford.mean()?,
            min: welford.min()?,
            max: welford.max()?,
            std_dev: welford.std_dev(),
        })
    }

    /// Summarise values that each stand for `weight` observations, such as
    /// differences with their rounded group counts. Zero weights and NaNs
    /// are ignored.
    pub fn from_weighted(values: &[(f64, u64)]) -> Option<Self> {
        let mut sorted: Vec<(f64, u64)> = values
            .iter()
            .copied()
            .filter(|(v, w)| !v.is_nan() && *w > 0)
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut welford = WelfordStats::new();
        for &(v, w) in &sorted {
            welford.update_weighted(v, w);
        }

        let [p10, p25, median, p75, p90, p95] = REPORTED_PERCENTILES
            .map(|p| weighted_percentile_midpoint(&sorted, p).unwrap_or(f64::NAN));

        Some(Self {
            count: welford.count(),
            p10,
            p25,
            median,
            p75,
            p90,
            p95,
            mean: welford.mean()?,
            min: welford.min()?,
            max: welford.max()?,
            std_dev: welford.std_dev(),
        })
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec!["statistic".to_string(), "value".to_string()]);
        let entries = [
            ("10th percentile", self.p10),
            ("25th percentile", self.p25),
            ("median", self.median),
            ("75th percentile", self.p75),
            ("90th percentile", self.p90),
            ("95th percentile", self.p95),
            ("mean", self.mean),
        ];
        for (name, value) in entries {
            table
                .rows
                .push(vec![Value::Text(name.to_string()), Value::Float(value)]);
        }
        table
    }
}
