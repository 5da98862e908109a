//! Join topology that unifies the cleaned sources into one analysis table
//!
//! Global invariants enforced:
//! - Every join is a left join: the anchor's rows are never dropped
//! - The comprehensive table has exactly the cleaned carbon-intensity rows, in their order
//! - Ratios with a zero or missing operand are `NaN`, never an error

use crate::clean::{
    CBAM_VALUE, COUNTRY_CODE, COUNTRY_NAME, GDP_VALUE, POPULATION_VALUE, REPORTER_ISO,
    TOTAL_EXPORT_VALUE, TOTAL_PATENTS,
};
use crate::error::{CbamError, Result};
use crate::source::SourceKey;
use crate::table::{ratio, Column, Table, LEFT_SUFFIX, RIGHT_SUFFIX};
use std::collections::BTreeMap;

pub const EXP_CBAM_PER_GDP: &str = "ExpCBAMperGDP";
pub const PCT_EXP_CBAM: &str = "PctExpCBAM";
pub const PAT_PER_CAP: &str = "PatPerCap";

/// Append `out = numerator / denominator`
fn with_ratio(table: Table, out: &str, numerator: &str, denominator: &str) -> Result<Table> {
    table.require(&[numerator, denominator], out)?;
    let values = match (table.numbers(numerator), table.numbers(denominator)) {
        (Some(n), Some(d)) => ratio(&n, &d),
        _ => {
            tracing::warn!(out, numerator, denominator, "ratio over non-numeric columns");
            vec![f64::NAN; table.n_rows()]
        }
    };
    table.with_column(out, Column::Number(values))
}

/// CBAM exports left-joined with GDP; adds `ExpCBAMperGDP`, sorted descending
pub fn merge_cbam_gdp(cbam: &Table, gdp: &Table) -> Result<Table> {
    let merged = cbam
        .left_join(gdp, REPORTER_ISO, COUNTRY_CODE)?
        .drop_columns(&["Country", COUNTRY_CODE]);
    let merged = with_ratio(merged, EXP_CBAM_PER_GDP, CBAM_VALUE, GDP_VALUE)?;
    tracing::info!(rows = merged.n_rows(), "merged CBAM exports with GDP");
    merged.sort_by(EXP_CBAM_PER_GDP, true)
}

/// Total exports left-joined with CBAM exports; adds `PctExpCBAM`, sorted descending
pub fn merge_cbam_total_exports(total: &Table, cbam: &Table) -> Result<Table> {
    let merged = total.left_join(cbam, REPORTER_ISO, REPORTER_ISO)?;
    let merged = with_ratio(merged, PCT_EXP_CBAM, CBAM_VALUE, TOTAL_EXPORT_VALUE)?;
    tracing::info!(rows = merged.n_rows(), "merged total exports with CBAM exports");
    merged.sort_by(PCT_EXP_CBAM, true)
}

/// Patents left-joined with population; adds `PatPerCap` and drops the intermediates
pub fn merge_patents_population(patents: &Table, population: &Table) -> Result<Table> {
    let merged = patents
        .left_join(population, COUNTRY_CODE, COUNTRY_CODE)?
        .drop_columns(&[COUNTRY_NAME]);
    let merged = with_ratio(merged, PAT_PER_CAP, TOTAL_PATENTS, POPULATION_VALUE)?
        .drop_columns(&[TOTAL_PATENTS, POPULATION_VALUE]);
    tracing::info!(rows = merged.n_rows(), "merged patents with population");
    merged.sort_by(PAT_PER_CAP, true)
}

/// Cleaned tables keyed by source
pub type CleanedSources = BTreeMap<SourceKey, Table>;

fn cleaned_source<'a>(sources: &'a CleanedSources, key: SourceKey) -> Result<&'a Table> {
    sources.get(&key).ok_or_else(|| CbamError::UnknownDataset {
        key: key.as_str().to_string(),
        available: sources
            .keys()
            .map(SourceKey::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Compose every cleaned source into the comprehensive table, anchored on carbon intensity
pub fn build_comprehensive_dataset(sources: &CleanedSources) -> Result<Table> {
    tracing::info!("building comprehensive dataset");
    let cbam = cleaned_source(sources, SourceKey::CbamExports)?;

    let cbam_gdp = merge_cbam_gdp(cbam, cleaned_source(sources, SourceKey::Gdp)?)?;
    let cbam_total =
        merge_cbam_total_exports(cleaned_source(sources, SourceKey::TotalExports)?, cbam)?;

    let cbam_x = format!("{}{}", CBAM_VALUE, LEFT_SUFFIX);
    let cbam_y = format!("{}{}", CBAM_VALUE, RIGHT_SUFFIX);
    let exports = cbam_total
        .left_join(&cbam_gdp, REPORTER_ISO, REPORTER_ISO)?
        .drop_columns(&[
            TOTAL_EXPORT_VALUE,
            cbam_x.as_str(),
            GDP_VALUE,
            cbam_y.as_str(),
        ])
        .select(&[REPORTER_ISO, PCT_EXP_CBAM, EXP_CBAM_PER_GDP])?;

    let carbon = cleaned_source(sources, SourceKey::CarbonIntensity)?;
    let with_exports = carbon
        .left_join(&exports, COUNTRY_CODE, REPORTER_ISO)?
        .drop_columns(&[REPORTER_ISO]);

    let spi = cleaned_source(sources, SourceKey::Spi)?.select(&[COUNTRY_CODE, "SPI_Score"])?;
    let with_spi = with_exports.left_join(&spi, COUNTRY_CODE, COUNTRY_CODE)?;

    let innovation = merge_patents_population(
        cleaned_source(sources, SourceKey::Patents)?,
        cleaned_source(sources, SourceKey::Population)?,
    )?
    .select(&[COUNTRY_CODE, PAT_PER_CAP])?;
    let with_innovation = with_spi.left_join(&innovation, COUNTRY_CODE, COUNTRY_CODE)?;

    let elasticity = cleaned_source(sources, SourceKey::TradeElasticity)?
        .select(&[COUNTRY_CODE, "Trade_Elast"])?;
    let comprehensive = with_innovation.left_join(&elasticity, COUNTRY_CODE, COUNTRY_CODE)?;

    tracing::info!(
        rows = comprehensive.n_rows(),
        columns = comprehensive.n_cols(),
        "comprehensive dataset built"
    );
    Ok(comprehensive)
}
