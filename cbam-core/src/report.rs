//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Missing values render as empty cells (CSV, text) or `null` (JSON)

use crate::error::Result;
use crate::risk::{numeric_or_missing, RISK_CATEGORY_COLUMN};
use crate::scoring::RiskDriver;
use crate::stats;
use crate::table::Table;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Descriptive statistics of one index column over its present values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

/// A country paired with its index value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryScore {
    pub country: String,
    pub value: f64,
}

/// Headline results for one risk index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskReport {
    pub index: String,
    pub summary_stats: SummaryStats,
    pub highest_risk: Vec<CountryScore>,
    pub lowest_risk: Vec<CountryScore>,
    pub mean_risk: f64,
    pub median_risk: f64,
    pub total_countries: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub categories: BTreeMap<String, usize>,
}

/// Country label used in reports: `Country Name` when present, else `Country Code`
pub fn country_column(table: &Table) -> &'static str {
    if table.has_column("Country Name") {
        "Country Name"
    } else {
        "Country Code"
    }
}

pub fn summary_statistics(table: &Table, index_col: &str) -> Result<SummaryStats> {
    table.require(&[index_col], "summary input")?;
    let values = numeric_or_missing(table, index_col);
    Ok(SummaryStats {
        count: stats::count(&values),
        mean: stats::mean(&values),
        std: stats::std_dev(&values),
        min: stats::min(&values),
        q25: stats::quantile(&values, 0.25),
        median: stats::median(&values),
        q75: stats::quantile(&values, 0.75),
        max: stats::max(&values),
    })
}

/// Summary statistics plus the highest `top_n` and lowest `bottom_n` countries.
///
/// Both lists are taken from one descending sort (missing values last), so the
/// lowest list keeps descending order.
pub fn summary_report(
    table: &Table,
    index_col: &str,
    country_col: &str,
    top_n: usize,
    bottom_n: usize,
) -> Result<RiskReport> {
    table.require(&[index_col, country_col], "report input")?;
    let summary_stats = summary_statistics(table, index_col)?;
    let sorted = table.sort_by(index_col, true)?;

    let scores = |t: &Table| -> Vec<CountryScore> {
        let countries = t.column(country_col);
        let values = numeric_or_missing(t, index_col);
        (0..t.n_rows())
            .map(|row| CountryScore {
                country: countries.as_ref().map(|c| c.display_at(row)).unwrap_or_default(),
                value: values[row],
            })
            .collect()
    };

    let mut categories = BTreeMap::new();
    if let Some(labels) = table.texts(RISK_CATEGORY_COLUMN) {
        for label in labels.iter().flatten() {
            *categories.entry(label.clone()).or_insert(0) += 1;
        }
    }

    tracing::info!(index = index_col, "generated risk report");
    Ok(RiskReport {
        index: index_col.to_string(),
        mean_risk: summary_stats.mean,
        median_risk: summary_stats.median,
        summary_stats,
        highest_risk: scores(&sorted.head(top_n)),
        lowest_risk: scores(&sorted.tail(bottom_n)),
        total_countries: table.n_rows(),
        categories,
    })
}

/// Render a report as text output
pub fn render_text(report: &RiskReport) -> String {
    let mut output = String::new();
    let s = &report.summary_stats;

    output.push_str(&format!("CBAM exposure risk: {}\n", report.index));
    output.push_str(&format!(
        "countries: {}  scored: {}  mean: {}  median: {}  std: {}\n",
        report.total_countries,
        s.count,
        fmt_value(report.mean_risk),
        fmt_value(report.median_risk),
        fmt_value(s.std)
    ));
    output.push_str(&format!(
        "min: {}  25%: {}  75%: {}  max: {}\n",
        fmt_value(s.min),
        fmt_value(s.q25),
        fmt_value(s.q75),
        fmt_value(s.max)
    ));

    for (title, scores) in [
        ("Highest risk", &report.highest_risk),
        ("Lowest risk", &report.lowest_risk),
    ] {
        output.push_str(&format!("\n{}\n", title));
        output.push_str(&format!("{:<30} {}\n", "Country", "Index"));
        for score in scores {
            output.push_str(&format!(
                "{} {}\n",
                truncate_or_pad(&score.country, 30),
                fmt_value(score.value)
            ));
        }
    }

    if !report.categories.is_empty() {
        output.push_str("\nRisk categories\n");
        for (category, count) in &report.categories {
            output.push_str(&format!("{:<10} {}\n", category, count));
        }
    }

    output
}

/// Render a report as JSON output
pub fn render_json(report: &RiskReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Render one country's drivers, largest first
pub fn render_drivers_text(country: &str, drivers: &[RiskDriver]) -> String {
    let mut output = format!("Risk drivers: {}\n", country);
    if drivers.is_empty() {
        output.push_str("(country not found)\n");
        return output;
    }
    for driver in drivers {
        output.push_str(&format!(
            "{} {}\n",
            truncate_or_pad(&driver.component, 24),
            fmt_value(driver.value)
        ));
    }
    output
}

/// Render drivers as a JSON array
pub fn render_drivers_json(drivers: &[RiskDriver]) -> String {
    serde_json::to_string_pretty(drivers).unwrap_or_else(|_| "[]".to_string())
}

/// Fixed-width rendering of the listed columns that are present
pub fn render_table_text<S: AsRef<str>>(table: &Table, columns: &[S]) -> String {
    let view = match table.select(columns) {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!(error = %e, "cannot project table for rendering");
            return String::new();
        }
    };
    let names = view.column_names();
    let materialized = view.columns();
    let mut output = String::new();
    output.push_str(
        &names
            .iter()
            .map(|n| truncate_or_pad(n, 16))
            .collect::<Vec<_>>()
            .join(" "),
    );
    output.push('\n');
    for row in 0..view.n_rows() {
        let cells: Vec<String> = materialized
            .iter()
            .map(|(_, column)| match column.as_numbers() {
                Some(values) => truncate_or_pad(&fmt_value(values[row]), 16),
                None => truncate_or_pad(&column.display_at(row), 16),
            })
            .collect();
        output.push_str(cells.join(" ").trim_end());
        output.push('\n');
    }
    output
}

/// Write every column of `table` as a flat CSV file; missing cells are empty
pub fn export_csv(table: &Table, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(table.column_names())?;
    let columns = table.columns();
    for row in 0..table.n_rows() {
        writer.write_record(columns.iter().map(|(_, c)| c.display_at(row)))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = table.n_rows(), "exported results");
    Ok(())
}

fn fmt_value(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{:.4}", value)
    }
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn scored() -> Table {
        Table::new(vec![
            (
                "Country Name".to_string(),
                Column::text(&["A", "B", "C", "D"]),
            ),
            (
                "Index_baseline".to_string(),
                Column::Number(vec![0.2, 0.8, f64::NAN, 0.5]),
            ),
            (
                RISK_CATEGORY_COLUMN.to_string(),
                Column::text(&["Low", "High", "Unknown", "Medium"]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_summary_statistics_exclude_missing() {
        let stats = summary_statistics(&scored(), "Index_baseline").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 0.2);
        assert_eq!(stats.max, 0.8);
        assert!((stats.median - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_report_top_and_bottom() {
        let report = summary_report(&scored(), "Index_baseline", "Country Name", 2, 2).unwrap();
        let top: Vec<_> = report.highest_risk.iter().map(|s| s.country.as_str()).collect();
        let bottom: Vec<_> = report.lowest_risk.iter().map(|s| s.country.as_str()).collect();
        assert_eq!(top, vec!["B", "D"]);
        assert_eq!(bottom, vec!["A", "C"]);
        assert_eq!(report.total_countries, 4);
        assert_eq!(report.categories["High"], 1);
    }

    #[test]
    fn test_render_json_uses_null_for_missing() {
        let report = summary_report(&scored(), "Index_baseline", "Country Name", 4, 1).unwrap();
        let json = render_json(&report);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["index"], "Index_baseline");
        assert!(parsed["highest_risk"][3]["value"].is_null());
        assert_eq!(parsed["summary_stats"]["count"], 3);
    }

    #[test]
    fn test_render_text_lists_countries() {
        let report = summary_report(&scored(), "Index_baseline", "Country Name", 1, 1).unwrap();
        let text = render_text(&report);
        assert!(text.contains("Highest risk"));
        assert!(text.contains("0.8000"));
        assert!(text.contains("Risk categories"));
    }

    #[test]
    fn test_export_csv_writes_empty_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&scored(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Country Name,Index_baseline,RiskCategory");
        assert_eq!(lines[3], "C,,Unknown");
    }

    #[test]
    fn test_truncate_or_pad_handles_multibyte() {
        assert_eq!(truncate_or_pad("Côte d'Ivoire", 8), "Côte ...");
        assert_eq!(truncate_or_pad("FRA", 5), "FRA  ");
    }

    #[test]
    fn test_country_column_falls_back_to_code() {
        let table = Table::new(vec![("Country Code".to_string(), Column::text(&["FRA"]))]).unwrap();
        assert_eq!(country_column(&table), "Country Code");
        assert_eq!(country_column(&scored()), "Country Name");
    }
}
