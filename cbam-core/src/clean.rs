//! Per-source cleaning transforms
//!
//! Global invariants enforced:
//! - Cleaning is pure: no I/O, the input table is never modified
//! - Only the subset of a drop list that is present gets dropped
//! - Every cleaned table carries its source's required columns or fails with `MissingColumns`

use crate::config::{ResolvedConfig, TO_HUNDRED_THOUSANDS, TO_MILLIONS};
use crate::error::Result;
use crate::risk::numeric_or_missing;
use crate::source::SourceKey;
use crate::table::{Column, Table};

pub const CBAM_VALUE: &str = "CBAM Value (millions)";
pub const TOTAL_EXPORT_VALUE: &str = "Total Export Value (millions)";
pub const GDP_VALUE: &str = "2019 GDP (Millions)";
pub const POPULATION_VALUE: &str = "Population (Hundreds of Thousands)";
pub const TOTAL_PATENTS: &str = "TotalPat_2019";
pub const PRIMARY_VALUE: &str = "PrimaryValue";
pub const REPORTER_ISO: &str = "ReporterISO";
pub const COUNTRY_CODE: &str = "Country Code";
pub const COUNTRY_NAME: &str = "Country Name";

const WORLD_BANK_SERIES_COLUMNS: &[&str] = &["Country Name", "Series Name", "Series Code"];
const PATENT_METADATA_COLUMNS: &[&str] = &["Origin", "Type"];

/// Columns every cleaned table of `source` must carry
pub fn required_columns(source: SourceKey) -> &'static [&'static str] {
    match source {
        SourceKey::CbamExports => &[REPORTER_ISO, CBAM_VALUE],
        SourceKey::TotalExports => &[REPORTER_ISO, TOTAL_EXPORT_VALUE],
        SourceKey::Gdp => &[COUNTRY_CODE, GDP_VALUE],
        SourceKey::CarbonIntensity => &[COUNTRY_CODE, "Carbon_Intensity"],
        SourceKey::Spi => &[COUNTRY_CODE, "SPI_Score"],
        SourceKey::Patents => &[COUNTRY_CODE, TOTAL_PATENTS],
        SourceKey::Population => &[COUNTRY_CODE, POPULATION_VALUE],
        SourceKey::TradeElasticity => &[COUNTRY_CODE, "Trade_Elast"],
    }
}

/// Clean one raw source into its canonical shape
pub fn clean(raw: &Table, source: SourceKey, config: &ResolvedConfig) -> Result<Table> {
    let cleaned = match source {
        SourceKey::CbamExports => clean_cbam_exports(raw, config)?,
        SourceKey::TotalExports => clean_total_exports(raw, config)?,
        SourceKey::Gdp => raw.clone(),
        SourceKey::CarbonIntensity => {
            clean_sorted_metric(raw, config, source, "Carbon_Intensity")?
        }
        SourceKey::Spi => {
            let pruned = raw.clone().drop_columns(WORLD_BANK_SERIES_COLUMNS);
            clean_sorted_metric(&pruned, config, source, "SPI_Score")?
        }
        SourceKey::Patents => clean_patents(raw, config)?,
        SourceKey::Population => clean_population(raw, config)?,
        SourceKey::TradeElasticity => clean_sorted_metric(raw, config, source, "Trade_Elast")?,
    };

    cleaned.require(required_columns(source), source.as_str())?;
    tracing::info!(
        source = %source,
        rows = cleaned.n_rows(),
        columns = cleaned.n_cols(),
        "prepared dataset"
    );
    Ok(cleaned)
}

/// Drop the Comtrade metadata columns that are present
pub fn drop_comtrade_columns(table: &Table, config: &ResolvedConfig) -> Table {
    let before = table.n_cols();
    let cleaned = table
        .clone()
        .drop_columns(&config.comtrade_columns_to_remove);
    tracing::info!(
        before,
        after = cleaned.n_cols(),
        "removed Comtrade metadata columns"
    );
    cleaned
}

/// Divide `column` by `factor` into `new_column`, dropping the source column unless `keep_original`
pub fn convert_units(
    table: &Table,
    column: &str,
    new_column: &str,
    factor: f64,
    keep_original: bool,
) -> Result<Table> {
    table.require(&[column], new_column)?;
    if table.numbers(column).is_none() {
        tracing::warn!(column, "unit conversion on a non-numeric column; values become missing");
    }
    let converted = numeric_or_missing(table, column)
        .into_iter()
        .map(|v| v / factor)
        .collect();
    let out = table.clone().with_column(new_column, Column::Number(converted))?;
    Ok(if keep_original || column == new_column {
        out
    } else {
        out.drop_columns(&[column])
    })
}

/// Divide by one million
pub fn to_millions(table: &Table, column: &str, new_column: &str) -> Result<Table> {
    convert_units(table, column, new_column, TO_MILLIONS, false)
}

/// Divide by one hundred thousand
pub fn to_hundred_thousands(table: &Table, column: &str, new_column: &str) -> Result<Table> {
    convert_units(table, column, new_column, TO_HUNDRED_THOUSANDS, false)
}

fn clean_cbam_exports(raw: &Table, config: &ResolvedConfig) -> Result<Table> {
    let pruned = drop_comtrade_columns(raw, config);
    let converted = to_millions(&pruned, PRIMARY_VALUE, CBAM_VALUE)?;
    converted.sort_by(CBAM_VALUE, true)
}

fn clean_total_exports(raw: &Table, config: &ResolvedConfig) -> Result<Table> {
    let pruned = drop_comtrade_columns(raw, config);
    to_millions(&pruned, PRIMARY_VALUE, TOTAL_EXPORT_VALUE)
}

/// Rename per the source map, then sort descending by the canonical metric
fn clean_sorted_metric(
    raw: &Table,
    config: &ResolvedConfig,
    source: SourceKey,
    metric: &str,
) -> Result<Table> {
    let renamed = raw.clone().rename(config.renames_for(source))?;
    renamed.sort_by(metric, true)
}

fn clean_patents(raw: &Table, config: &ResolvedConfig) -> Result<Table> {
    let years: Vec<String> = config
        .patent_years
        .clone()
        .map(|y| y.to_string())
        .filter(|y| raw.has_column(y))
        .collect();

    let mut totals = vec![0.0; raw.n_rows()];
    for year in &years {
        let Some(values) = raw.numbers(year) else {
            tracing::warn!(column = %year, "patent year column is not numeric; skipped");
            continue;
        };
        for (total, v) in totals.iter_mut().zip(values) {
            if !v.is_nan() {
                *total += v;
            }
        }
    }
    tracing::info!(years = years.len(), "summed yearly patent applications");

    let summed = raw
        .clone()
        .with_column(TOTAL_PATENTS, Column::Number(totals))?
        .drop_columns(&years)
        .drop_columns(PATENT_METADATA_COLUMNS);
    summed.rename(config.renames_for(SourceKey::Patents))
}

fn clean_population(raw: &Table, config: &ResolvedConfig) -> Result<Table> {
    let renamed = raw
        .clone()
        .drop_columns(WORLD_BANK_SERIES_COLUMNS)
        .rename(config.renames_for(SourceKey::Population))?;
    to_hundred_thousands(&renamed, "Population_2019", POPULATION_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CbamError;

    fn config() -> ResolvedConfig {
        ResolvedConfig::defaults().unwrap()
    }

    fn comtrade(codes: &[&str], values: &[f64]) -> Table {
        Table::new(vec![
            ("TypeCode".to_string(), Column::text(&vec!["C"; codes.len()])),
            ("ReporterISO".to_string(), Column::text(codes)),
            ("PartnerISO".to_string(), Column::text(&vec!["W00"; codes.len()])),
            ("PrimaryValue".to_string(), Column::Number(values.to_vec())),
        ])
        .unwrap()
    }

    #[test]
    fn test_cbam_exports_pruned_converted_and_sorted() {
        let raw = comtrade(&["USA", "CHN"], &[2_000_000.0, 50_000_000.0]);
        let out = clean(&raw, SourceKey::CbamExports, &config()).unwrap();
        assert_eq!(out.column_names(), vec!["ReporterISO", CBAM_VALUE]);
        assert_eq!(out.numbers(CBAM_VALUE).unwrap(), &[50.0, 2.0]);
    }

    #[test]
    fn test_total_exports_keep_input_order() {
        let raw = comtrade(&["USA", "CHN"], &[2_000_000.0, 50_000_000.0]);
        let out = clean(&raw, SourceKey::TotalExports, &config()).unwrap();
        assert_eq!(out.numbers(TOTAL_EXPORT_VALUE).unwrap(), &[2.0, 50.0]);
    }

    #[test]
    fn test_convert_units_keep_original() {
        let raw = comtrade(&["USA"], &[3e6]);
        let out = convert_units(&raw, PRIMARY_VALUE, "M", TO_MILLIONS, true).unwrap();
        assert!(out.has_column(PRIMARY_VALUE));
        assert_eq!(out.numbers("M").unwrap(), &[3.0]);
    }

    #[test]
    fn test_spi_drops_series_columns_and_renames() {
        let raw = Table::new(vec![
            ("Country Name".to_string(), Column::text(&["A", "B"])),
            ("Country Code".to_string(), Column::text(&["AAA", "BBB"])),
            ("Series Name".to_string(), Column::text(&["SPI", "SPI"])),
            ("Series Code".to_string(), Column::text(&["X", "X"])),
            ("2019 [YR2019]".to_string(), Column::Number(vec![40.0, 80.0])),
        ])
        .unwrap();
        let out = clean(&raw, SourceKey::Spi, &config()).unwrap();
        assert_eq!(out.column_names(), vec!["Country Code", "SPI_Score"]);
        assert_eq!(out.numbers("SPI_Score").unwrap(), &[80.0, 40.0]);
    }

    #[test]
    fn test_patents_sum_present_years_skipping_missing() {
        let raw = Table::new(vec![
            ("Office".to_string(), Column::text(&["France", "Chile"])),
            ("Office (Code)".to_string(), Column::text(&["FRA", "CHL"])),
            ("Origin".to_string(), Column::text(&["Total", "Total"])),
            ("Type".to_string(), Column::text(&["Total", "Total"])),
            ("1995".to_string(), Column::Number(vec![1.0, f64::NAN])),
            ("2019".to_string(), Column::Number(vec![2.0, 5.0])),
            ("2020".to_string(), Column::Number(vec![100.0, 100.0])),
        ])
        .unwrap();
        let out = clean(&raw, SourceKey::Patents, &config()).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["Country Name", "Country Code", "2020", TOTAL_PATENTS]
        );
        assert_eq!(out.numbers(TOTAL_PATENTS).unwrap(), &[3.0, 5.0]);
    }

    #[test]
    fn test_population_converted_to_hundred_thousands() {
        let raw = Table::new(vec![
            ("Country Name".to_string(), Column::text(&["France"])),
            ("Country Code".to_string(), Column::text(&["FRA"])),
            ("Series Name".to_string(), Column::text(&["Population, total"])),
            ("Series Code".to_string(), Column::text(&["SP.POP.TOTL"])),
            ("2019 [YR2019]".to_string(), Column::Number(vec![67_000_000.0])),
        ])
        .unwrap();
        let out = clean(&raw, SourceKey::Population, &config()).unwrap();
        assert_eq!(out.column_names(), vec!["Country Code", POPULATION_VALUE]);
        assert_eq!(out.numbers(POPULATION_VALUE).unwrap(), &[670.0]);
    }

    #[test]
    fn test_gdp_passes_through() {
        let raw = Table::new(vec![
            ("Country".to_string(), Column::text(&["France"])),
            ("Country Code".to_string(), Column::text(&["FRA"])),
            (GDP_VALUE.to_string(), Column::Number(vec![2700000.0])),
        ])
        .unwrap();
        assert_eq!(clean(&raw, SourceKey::Gdp, &config()).unwrap(), raw);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let raw = Table::new(vec![(
            "Country Code".to_string(),
            Column::text(&["FRA"]),
        )])
        .unwrap();
        let err = clean(&raw, SourceKey::TradeElasticity, &config()).unwrap_err();
        match err {
            CbamError::MissingColumns { dataset, columns } => {
                assert_eq!(dataset, "trade_elasticity");
                assert_eq!(columns, vec!["Trade_Elast"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_primary_value_is_fatal() {
        let raw = Table::new(vec![("ReporterISO".to_string(), Column::text(&["USA"]))]).unwrap();
        assert!(clean(&raw, SourceKey::CbamExports, &config()).is_err());
    }
}
