//! Risk category assignment
//!
//! Global invariants enforced:
//! - A value equal to a threshold falls into that threshold's bucket (closed upper bound)
//! - Missing values always map to `Unknown`, never to a bucket

use crate::error::Result;
use crate::stats;
use crate::table::{Column, Table};
use serde::Serialize;
use std::cmp::Ordering;

pub const RISK_CATEGORY_COLUMN: &str = "RiskCategory";
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Named upper bounds for risk categories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskThresholds {
    /// Buckets in ascending threshold order
    buckets: Vec<(String, f64)>,
    /// Category for values above every threshold (the last declared one)
    overflow: String,
}

impl RiskThresholds {
    /// Build thresholds from `(category, upper bound)` pairs in declaration order
    pub fn new(buckets: Vec<(String, f64)>) -> Self {
        let overflow = buckets
            .last()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        let mut buckets = buckets;
        buckets.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        RiskThresholds { buckets, overflow }
    }

    pub fn low_medium_high(low: f64, medium: f64, high: f64) -> Self {
        RiskThresholds::new(vec![
            ("Low".to_string(), low),
            ("Medium".to_string(), medium),
            ("High".to_string(), high),
        ])
    }

    /// Low = 33rd percentile, Medium = 66th percentile, High = maximum of the observed values
    pub fn from_values(values: &[f64]) -> Self {
        RiskThresholds::low_medium_high(
            stats::quantile(values, 0.33),
            stats::quantile(values, 0.66),
            stats::max(values),
        )
    }

    pub fn buckets(&self) -> &[(String, f64)] {
        &self.buckets
    }

    pub fn categorize(&self, value: f64) -> &str {
        if value.is_nan() {
            return UNKNOWN_CATEGORY;
        }
        self.buckets
            .iter()
            .find(|(_, threshold)| value <= *threshold)
            .map(|(name, _)| name.as_str())
            .unwrap_or(self.overflow.as_str())
    }
}

/// Append a `RiskCategory` column for `index_col`.
///
/// Without explicit thresholds, percentile thresholds are fit on the current column.
pub fn categorize(
    table: &Table,
    index_col: &str,
    thresholds: Option<&RiskThresholds>,
) -> Result<Table> {
    table.require(&[index_col], "risk categorization input")?;
    let values = numeric_or_missing(table, index_col);

    let fitted;
    let thresholds = match thresholds {
        Some(t) => t,
        None => {
            fitted = RiskThresholds::from_values(&values);
            &fitted
        }
    };

    let categories = values
        .iter()
        .map(|&v| Some(thresholds.categorize(v).to_string()))
        .collect();
    tracing::info!(index = index_col, "categorized countries into risk levels");
    table
        .clone()
        .with_column(RISK_CATEGORY_COLUMN, Column::Text(categories))
}

/// Numeric view of a column; a text column reads as all-missing
pub(crate) fn numeric_or_missing(table: &Table, name: &str) -> Vec<f64> {
    match table.numbers(name) {
        Some(values) => values,
        None => vec![f64::NAN; table.n_rows()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let t = RiskThresholds::low_medium_high(0.3, 0.6, 1.0);
        assert_eq!(t.categorize(0.3), "Low");
        assert_eq!(t.categorize(0.30001), "Medium");
        assert_eq!(t.categorize(0.6), "Medium");
        assert_eq!(t.categorize(1.0), "High");
    }

    #[test]
    fn test_missing_is_unknown() {
        let t = RiskThresholds::low_medium_high(0.3, 0.6, 1.0);
        assert_eq!(t.categorize(f64::NAN), UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_value_above_every_threshold_takes_last_declared() {
        let t = RiskThresholds::new(vec![
            ("High".to_string(), 0.9),
            ("Low".to_string(), 0.1),
        ]);
        assert_eq!(t.categorize(0.05), "Low");
        assert_eq!(t.categorize(0.5), "High");
        assert_eq!(t.categorize(5.0), "Low");
    }

    #[test]
    fn test_categorize_with_percentile_defaults() {
        let table = Table::new(vec![
            (
                "Index".to_string(),
                Column::Number(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, f64::NAN]),
            ),
        ])
        .unwrap();
        let out = categorize(&table, "Index", None).unwrap();
        let cats: Vec<String> = out
            .texts(RISK_CATEGORY_COLUMN)
            .unwrap()
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(cats[0], "Low");
        assert_eq!(cats[9], "High");
        assert_eq!(cats[10], "Unknown");
        assert!(cats.iter().any(|c| c == "Medium"));
    }

    #[test]
    fn test_thresholds_serialize_in_ascending_order() {
        let t = RiskThresholds::new(vec![
            ("High".to_string(), 0.9),
            ("Low".to_string(), 0.1),
        ]);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "buckets": [["Low", 0.1], ["High", 0.9]],
                "overflow": "Low",
            })
        );
    }

    #[test]
    fn test_categorize_missing_column_is_error() {
        let table = Table::default();
        assert!(categorize(&table, "Index_baseline", None).is_err());
    }
}
