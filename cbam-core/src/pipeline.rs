//! End-to-end pipeline: load → clean → merge → engineer → score → report

use crate::clean::{self, required_columns};
use crate::config::ResolvedConfig;
use crate::features::engineer_features;
use crate::loader::{validate_dataset, DataLoader};
use crate::merge::{build_comprehensive_dataset, CleanedSources};
use crate::report::{country_column, summary_report, RiskReport};
use crate::risk::categorize;
use crate::scoring::{
    compare_scenarios, correlation_matrix, rank, risk_drivers, sensitivity_analysis,
    CorrelationMatrix, RiskDriver, WeightScenario,
};
use crate::source::SourceKey;
use crate::table::Table;
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Everything one pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Primary index column (the first scenario's)
    pub index_column: String,
    pub country_column: String,
    pub scenarios: Vec<WeightScenario>,
    /// Merged table before feature engineering
    pub comprehensive: Table,
    /// Engineered features with one index column per scenario
    pub scored: Table,
    /// `scored` ranked and categorized by the primary index
    pub ranked: Table,
    pub comparison: Table,
    pub correlation: CorrelationMatrix,
    pub report: RiskReport,
    /// Component breakdown for each of the highest-risk countries
    pub drivers: Vec<(String, Vec<RiskDriver>)>,
}

/// Clean every loaded source
pub fn prepare_all(
    raw: &BTreeMap<SourceKey, Table>,
    config: &ResolvedConfig,
) -> Result<CleanedSources> {
    let mut cleaned = CleanedSources::new();
    for (source, table) in raw {
        validate_dataset(table, &[] as &[&str], source.as_str())?;
        let table = clean::clean(table, *source, config)
            .with_context(|| format!("failed to prepare {}", source))?;
        validate_dataset(&table, required_columns(*source), source.as_str())?;
        cleaned.insert(*source, table);
    }
    Ok(cleaned)
}

/// Score an already merged comprehensive table
pub fn score(comprehensive: Table, config: &ResolvedConfig) -> Result<PipelineOutput> {
    let index_column = config
        .scenarios
        .first()
        .map(WeightScenario::index_column)
        .context("no weight scenarios configured")?;
    let country_col = country_column(&comprehensive).to_string();

    let features = engineer_features(&comprehensive, config)?;
    let scored = sensitivity_analysis(&features, &config.scenarios)?;
    let ranked = rank(&scored, &index_column, false)?;
    let ranked = categorize(&ranked, &index_column, config.thresholds.as_ref())?;

    let comparison = compare_scenarios(
        &scored,
        &config.index_columns(),
        &country_col,
        config.compare_top_n,
    )?;
    let correlation = correlation_matrix(&scored, &config.component_columns());
    let report = summary_report(
        &ranked,
        &index_column,
        &country_col,
        config.top_n,
        config.bottom_n,
    )?;

    let components = config.component_columns();
    let drivers = report
        .highest_risk
        .iter()
        .map(|s| {
            let d = risk_drivers(&scored, &s.country, &components, &country_col);
            (s.country.clone(), d)
        })
        .collect();

    Ok(PipelineOutput {
        index_column,
        country_column: country_col,
        scenarios: config.scenarios.clone(),
        comprehensive,
        scored,
        ranked,
        comparison,
        correlation,
        report,
        drivers,
    })
}

/// Run the full pipeline over every registered dataset
pub fn run_pipeline(loader: &DataLoader<'_>, config: &ResolvedConfig) -> Result<PipelineOutput> {
    let raw = loader
        .load_all()
        .with_context(|| format!("failed to load datasets from {}", loader.data_dir().display()))?;
    let cleaned = prepare_all(&raw, config)?;
    let comprehensive = build_comprehensive_dataset(&cleaned)?;
    let output = score(comprehensive, config)?;
    tracing::info!(
        countries = output.ranked.n_rows(),
        scenarios = output.scenarios.len(),
        "pipeline complete"
    );
    Ok(output)
}
