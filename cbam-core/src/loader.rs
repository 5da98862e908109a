//! Raw dataset loading from a data directory
//!
//! Files are resolved through the dataset registry in [`ResolvedConfig`] and parsed
//! with the `csv` crate into a [`Table`]. A column is numeric when every present
//! cell parses as a number; otherwise it stays text.

use crate::config::ResolvedConfig;
use crate::error::{CbamError, Result};
use crate::source::SourceKey;
use crate::table::{Column, Table};
use csv::{ReaderBuilder, Trim};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Cell tokens read as missing values
const MISSING_TOKENS: &[&str] = &["", "..", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A"];

/// Share of missing cells above which a dataset is flagged
const NULL_SHARE_WARNING: f64 = 0.5;

/// Loads registered datasets from one directory
#[derive(Debug)]
pub struct DataLoader<'a> {
    data_dir: PathBuf,
    config: &'a ResolvedConfig,
}

impl<'a> DataLoader<'a> {
    /// Fails with `DataDirMissing` when `data_dir` does not exist
    pub fn new(data_dir: impl Into<PathBuf>, config: &'a ResolvedConfig) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.is_dir() {
            return Err(CbamError::DataDirMissing(data_dir));
        }
        Ok(DataLoader { data_dir, config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load one dataset by its logical key
    pub fn load_dataset(&self, key: &str) -> Result<Table> {
        let (source, file) = self
            .config
            .dataset_file(key)
            .ok_or_else(|| CbamError::UnknownDataset {
                key: key.to_string(),
                available: SourceKey::available(),
            })?;

        let path = self.data_dir.join(file);
        if !path.is_file() {
            return Err(CbamError::FileMissing(path));
        }

        tracing::info!(dataset = %source, path = %path.display(), "loading dataset");
        let table = read_csv(&path)?;
        tracing::info!(
            dataset = %source,
            rows = table.n_rows(),
            columns = table.n_cols(),
            "loaded dataset"
        );
        Ok(table)
    }

    /// Load every registered dataset; the first failure aborts
    pub fn load_all(&self) -> Result<BTreeMap<SourceKey, Table>> {
        tracing::info!("loading all datasets");
        let mut datasets = BTreeMap::new();
        for source in self.config.datasets.keys() {
            let table = self.load_dataset(source.as_str()).map_err(|e| {
                tracing::error!(dataset = %source, error = %e, "failed to load dataset");
                e
            })?;
            datasets.insert(*source, table);
        }
        tracing::info!(count = datasets.len(), "loaded all datasets");
        Ok(datasets)
    }
}

/// Check a dataset for emptiness and required columns; flags a heavy share of missing cells
pub fn validate_dataset<S: AsRef<str>>(table: &Table, required: &[S], name: &str) -> Result<()> {
    if table.is_empty() {
        return Err(CbamError::EmptyDataset(name.to_string()));
    }
    table.require(required, name)?;

    let null_share = table.missing_fraction();
    if null_share > NULL_SHARE_WARNING {
        tracing::warn!(
            dataset = name,
            null_share = %format!("{:.1}%", null_share * 100.0),
            "dataset is mostly missing values"
        );
    }
    tracing::info!(
        dataset = name,
        rows = table.n_rows(),
        columns = table.n_cols(),
        "validation passed"
    );
    Ok(())
}

/// Parse a CSV file into a table
pub fn read_csv(path: &Path) -> Result<Table> {
    let csv_error = |source: csv::Error| CbamError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(csv_error)?;

    let headers = column_headers(reader.headers().map_err(csv_error)?);
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut ragged = 0usize;

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != headers.len() {
            ragged += 1;
        }
        for (i, column) in cells.iter_mut().enumerate() {
            let cell = record
                .get(i)
                .filter(|v| !MISSING_TOKENS.contains(v))
                .map(str::to_string);
            column.push(cell);
        }
    }
    if ragged > 0 {
        tracing::warn!(
            path = %path.display(),
            rows = ragged,
            "rows with a field count different from the header"
        );
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| (name, infer_column(values)))
        .collect();
    Table::new(columns)
}

/// Header names with a stripped BOM, `Unnamed: i` for blanks and `.N` suffixes for repeats
fn column_headers(record: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    record
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let name = raw.trim_start_matches('\u{feff}').trim();
            let base = if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

fn infer_column(values: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<f64>> = values
        .iter()
        .map(|cell| match cell {
            None => Some(f64::NAN),
            Some(text) => text.parse::<f64>().ok(),
        })
        .collect();
    match parsed {
        Some(numbers) => Column::Number(numbers),
        None => Column::Text(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_csv_infers_types_and_missing_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "spi.csv",
            "\u{feff}Country Code,2019 [YR2019]\nFRA,80.5\nCHL,..\n,,\n",
        );
        let table = read_csv(&path).unwrap();
        assert_eq!(table.column_names(), vec!["Country Code", "2019 [YR2019]"]);
        assert_eq!(table.n_rows(), 2);
        let scores = table.numbers("2019 [YR2019]").unwrap();
        assert_eq!(scores[0], 80.5);
        assert!(scores[1].is_nan());
    }

    #[test]
    fn test_read_csv_names_blank_and_repeated_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.csv", "a,,a\nx,1,2\n");
        let table = read_csv(&path).unwrap();
        assert_eq!(table.column_names(), vec!["a", "Unnamed: 1", "a.1"]);
        assert!(table.texts("a").is_some());
    }

    #[test]
    fn test_short_rows_are_padded_with_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "t.csv", "a,b\n1\n2,3\n");
        let table = read_csv(&path).unwrap();
        let b = table.numbers("b").unwrap();
        assert!(b[0].is_nan());
        assert_eq!(b[1], 3.0);
    }

    #[test]
    fn test_new_rejects_missing_directory() {
        let config = ResolvedConfig::defaults().unwrap();
        let result = DataLoader::new("/definitely/not/here", &config);
        assert!(matches!(result, Err(CbamError::DataDirMissing(_))));
    }

    #[test]
    fn test_load_dataset_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolvedConfig::defaults().unwrap();
        let loader = DataLoader::new(dir.path(), &config).unwrap();

        assert!(matches!(
            loader.load_dataset("emissions"),
            Err(CbamError::UnknownDataset { .. })
        ));
        assert!(matches!(
            loader.load_dataset("gdp"),
            Err(CbamError::FileMissing(_))
        ));
    }

    #[test]
    fn test_load_dataset_uses_registry_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Trade elasticities.csv",
            "Country Code,TE\nFRA,1.2\n",
        );
        let config = ResolvedConfig::defaults().unwrap();
        let loader = DataLoader::new(dir.path(), &config).unwrap();
        let table = loader.load_dataset("trade_elasticity").unwrap();
        assert_eq!(table.numbers("TE").unwrap(), &[1.2]);
    }

    #[test]
    fn test_validate_dataset() {
        let table = Table::new(vec![
            ("Country Code".to_string(), Column::text(&["FRA"])),
            ("v".to_string(), Column::Number(vec![f64::NAN])),
        ])
        .unwrap();
        assert!(validate_dataset(&table, &["Country Code"], "t").is_ok());
        assert!(matches!(
            validate_dataset(&table, &["Population_2019"], "t"),
            Err(CbamError::MissingColumns { .. })
        ));
        assert!(matches!(
            validate_dataset(&Table::default(), &["a"], "t"),
            Err(CbamError::EmptyDataset(_))
        ));
    }
}
