//! Weighted risk indices, sensitivity analysis and ranking
//!
//! Global invariants enforced:
//! - Index = Σ weight × value over weight keys present in the table
//! - Absent weight keys and missing cells contribute exactly 0, so every row gets a finite index
//! - Ranking is stable: equal index values keep their input order
//! - No stored state; every operation returns a new table

use crate::error::Result;
use crate::stats;
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const INDEX_PREFIX: &str = "Index_";
pub const RANK_COLUMN: &str = "Rank";
pub const RANK_SUFFIX: &str = "_Rank";
pub const AVG_RANK_COLUMN: &str = "AvgRank";

/// A named weighting scheme over engineered feature columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightScenario {
    pub name: String,
    pub weights: BTreeMap<String, f64>,
}

impl WeightScenario {
    pub fn new(name: &str, weights: &[(&str, f64)]) -> Self {
        WeightScenario {
            name: name.to_string(),
            weights: weights
                .iter()
                .map(|(column, weight)| (column.to_string(), *weight))
                .collect(),
        }
    }

    /// Output column for this scenario, `Index_<name>`
    pub fn index_column(&self) -> String {
        format!("{}{}", INDEX_PREFIX, self.name)
    }
}

/// Add `out_name` = Σ weight × value over the weight keys present in `table`.
///
/// Absent (or non-numeric) weight keys are logged and contribute 0 for every row.
/// A missing cell in a present column contributes 0 for that row.
pub fn weighted_index(
    table: &Table,
    weights: &BTreeMap<String, f64>,
    out_name: &str,
) -> Result<Table> {
    let mut index = vec![0.0; table.n_rows()];
    let mut absent = Vec::new();
    let mut missing_cells = 0usize;

    for (column, weight) in weights {
        let Some(values) = table.numbers(column) else {
            absent.push(column.as_str());
            continue;
        };
        for (total, value) in index.iter_mut().zip(values) {
            if value.is_nan() {
                missing_cells += 1;
            } else {
                *total += weight * value;
            }
        }
    }

    if !absent.is_empty() {
        tracing::warn!(
            index = out_name,
            columns = ?absent,
            "weight columns not found in table; they contribute 0"
        );
    }
    if missing_cells > 0 {
        tracing::info!(
            index = out_name,
            missing_cells,
            "missing component values contribute 0"
        );
    }
    tracing::info!(
        index = out_name,
        components = weights.len(),
        "calculated weighted index"
    );

    table.clone().with_column(out_name, Column::Number(index))
}

/// Apply `weighted_index` once per scenario, adding one `Index_<name>` column each
pub fn sensitivity_analysis(table: &Table, scenarios: &[WeightScenario]) -> Result<Table> {
    let mut result = table.clone();
    for scenario in scenarios {
        result = weighted_index(&result, &scenario.weights, &scenario.index_column())?;
    }
    tracing::info!(
        scenarios = scenarios.len(),
        "completed sensitivity analysis"
    );
    Ok(result)
}

/// Stable sort by `index_col` and append an ordinal `Rank` (1..N).
///
/// Default direction is descending: the highest index gets rank 1. Missing values sort last.
pub fn rank(table: &Table, index_col: &str, ascending: bool) -> Result<Table> {
    table.require(&[index_col], "ranking input")?;
    let sorted = table.sort_by(index_col, !ascending)?;
    let ranks = (1..=sorted.n_rows()).map(|r| r as f64).collect();
    tracing::info!(index = index_col, "ranked countries");
    sorted.with_column(RANK_COLUMN, Column::Number(ranks))
}

/// Compare rankings across scenario columns.
///
/// Each present scenario column gets a competition rank (ties share the minimum,
/// highest value first) in `<col>_Rank`; `AvgRank` is the mean over the ranks a row has.
/// Rows are stably sorted by `AvgRank` ascending and truncated to `top_n`.
pub fn compare_scenarios<S: AsRef<str>>(
    table: &Table,
    scenario_cols: &[S],
    country_col: &str,
    top_n: usize,
) -> Result<Table> {
    table.require(&[country_col], "scenario comparison input")?;
    let mut comparison = table.select(&[country_col])?;
    let mut rank_columns: Vec<Vec<f64>> = Vec::new();

    for col in scenario_cols.iter().map(AsRef::<str>::as_ref) {
        let Some(values) = table.numbers(col) else {
            tracing::warn!(column = col, "scenario column not found; skipped");
            continue;
        };
        let ranks = stats::competition_rank(&values, true)?;
        comparison = comparison.with_column(
            format!("{}{}", col, RANK_SUFFIX),
            Column::Number(ranks.clone()),
        )?;
        rank_columns.push(ranks);
    }

    let avg_rank = (0..table.n_rows())
        .map(|row| {
            let row_ranks: Vec<f64> = rank_columns.iter().map(|r| r[row]).collect();
            stats::mean(&row_ranks)
        })
        .collect();
    let comparison = comparison.with_column(AVG_RANK_COLUMN, Column::Number(avg_rank))?;

    tracing::info!(
        scenarios = rank_columns.len(),
        top_n,
        "compared scenario rankings"
    );
    Ok(comparison.sort_by(AVG_RANK_COLUMN, false)?.head(top_n))
}

/// One component's contribution to a country's risk profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskDriver {
    pub component: String,
    pub value: f64,
}

/// Component values for one country, largest first (missing values last).
///
/// Unknown countries yield an empty list.
pub fn risk_drivers<S: AsRef<str>>(
    table: &Table,
    country: &str,
    component_cols: &[S],
    country_col: &str,
) -> Vec<RiskDriver> {
    let Some(row) = table.find_row(country_col, country) else {
        tracing::warn!(country, "country not found");
        return Vec::new();
    };

    let mut drivers: Vec<RiskDriver> = component_cols
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter_map(|col| {
            table.numbers(col).map(|values| RiskDriver {
                component: col.to_string(),
                value: values[row],
            })
        })
        .collect();

    drivers.sort_by(|a, b| match (a.value.is_nan(), b.value.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.value.total_cmp(&a.value),
    });
    tracing::info!(country, drivers = drivers.len(), "identified risk drivers");
    drivers
}

/// Pairwise Pearson correlations between component columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `values[i][j]` correlates `columns[i]` with `columns[j]`
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

/// Correlation matrix restricted to the listed columns that are present and numeric
pub fn correlation_matrix<S: AsRef<str>>(table: &Table, columns: &[S]) -> CorrelationMatrix {
    let present: Vec<(&str, Vec<f64>)> = columns
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter_map(|c| table.numbers(c).map(|values| (c, values)))
        .collect();

    let values = present
        .iter()
        .map(|(_, x)| present.iter().map(|(_, y)| stats::pearson(x, y)).collect())
        .collect();

    tracing::info!(columns = present.len(), "calculated correlation matrix");
    CorrelationMatrix {
        columns: present.iter().map(|(c, _)| c.to_string()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> Table {
        Table::new(vec![
            ("Country Name".to_string(), Column::text(&["A", "B", "C"])),
            ("x".to_string(), Column::Number(vec![1.0, 0.5, 0.0])),
            ("y".to_string(), Column::Number(vec![0.0, 0.5, f64::NAN])),
        ])
        .unwrap()
    }

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_weighted_index_is_dot_product() {
        let out = weighted_index(&features(), &weights(&[("x", 0.6), ("y", 0.4)]), "I").unwrap();
        let index = out.numbers("I").unwrap();
        assert!((index[0] - 0.6).abs() < 1e-12);
        assert!((index[1] - 0.5).abs() < 1e-12);
        // Missing y contributes 0
        assert_eq!(index[2], 0.0);
    }

    #[test]
    fn test_absent_or_zero_weight_keys_do_not_change_index() {
        let base = weighted_index(&features(), &weights(&[("x", 0.6)]), "I").unwrap();
        let extra = weighted_index(
            &features(),
            &weights(&[("x", 0.6), ("missing", 0.9), ("y", 0.0)]),
            "I",
        )
        .unwrap();
        assert_eq!(base.numbers("I"), extra.numbers("I"));
    }

    #[test]
    fn test_sensitivity_analysis_adds_one_column_per_scenario() {
        let scenarios = vec![
            WeightScenario::new("a", &[("x", 1.0)]),
            WeightScenario::new("b", &[("y", 1.0)]),
        ];
        let out = sensitivity_analysis(&features(), &scenarios).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["Country Name", "x", "y", "Index_a", "Index_b"]
        );
    }

    #[test]
    fn test_rank_is_ordinal_and_stable_on_ties() {
        let table = Table::new(vec![
            ("c".to_string(), Column::text(&["A", "B", "C", "D"])),
            ("i".to_string(), Column::Number(vec![0.2, 0.9, 0.2, f64::NAN])),
        ])
        .unwrap();
        let ranked = rank(&table, "i", false).unwrap();
        let order: Vec<_> = ranked.texts("c").unwrap().into_iter().flatten().collect();
        assert_eq!(order, vec!["B", "A", "C", "D"]);
        assert_eq!(ranked.numbers(RANK_COLUMN).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_compare_scenarios_average_rank_and_order() {
        let table = Table::new(vec![
            ("Country Name".to_string(), Column::text(&["A", "B"])),
            ("s1".to_string(), Column::Number(vec![10.0, 20.0])),
            ("s2".to_string(), Column::Number(vec![20.0, 10.0])),
        ])
        .unwrap();
        let out = compare_scenarios(&table, &["s1", "s2", "absent"], "Country Name", 10).unwrap();
        assert_eq!(out.numbers(AVG_RANK_COLUMN).unwrap(), &[1.5, 1.5]);
        let order: Vec<_> = out.texts("Country Name").unwrap().into_iter().flatten().collect();
        assert_eq!(order, vec!["A", "B"]);
        assert!(out.has_column("s1_Rank"));
        assert!(!out.has_column("absent_Rank"));
    }

    #[test]
    fn test_compare_scenarios_truncates_to_top_n() {
        let table = Table::new(vec![
            ("Country Name".to_string(), Column::text(&["A", "B", "C"])),
            ("s1".to_string(), Column::Number(vec![1.0, 3.0, 2.0])),
        ])
        .unwrap();
        let out = compare_scenarios(&table, &["s1"], "Country Name", 2).unwrap();
        let order: Vec<_> = out.texts("Country Name").unwrap().into_iter().flatten().collect();
        assert_eq!(order, vec!["B", "C"]);
    }

    #[test]
    fn test_risk_drivers_sorted_descending() {
        let drivers = risk_drivers(&features(), "B", &["y", "x", "nope"], "Country Name");
        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[0].value, 0.5);

        let drivers = risk_drivers(&features(), "C", &["y", "x"], "Country Name");
        assert_eq!(drivers[0].component, "x");
        assert!(drivers[1].value.is_nan());
    }

    #[test]
    fn test_risk_drivers_unknown_country_is_empty() {
        assert!(risk_drivers(&features(), "Atlantis", &["x"], "Country Name").is_empty());
    }

    #[test]
    fn test_correlation_matrix_skips_absent_columns() {
        let m = correlation_matrix(&features(), &["x", "y", "absent", "Country Name"]);
        assert_eq!(m.columns, vec!["x", "y"]);
        assert_eq!(m.get("x", "x"), Some(1.0));
        // Only two complete pairs remain and they are perfectly anti-correlated
        assert!((m.get("x", "y").unwrap() + 1.0).abs() < 1e-12);
    }
}
