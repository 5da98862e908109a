//! In-memory column store backed by a polars `DataFrame`
//!
//! Global invariants enforced:
//! - Every column holds exactly `n_rows` cells
//! - Column names are unique and column order is preserved by every transform
//! - Missing cells are polars nulls; they read back as `None` (text) or `NaN` (numbers)
//! - Sorting is stable and always places missing values last
//! - Transforms return new tables; callers never observe in-place mutation

use crate::error::{CbamError, Result};
use polars::prelude::{
    col, DataFrame, DataType, IdxCa, IdxSize, IntoColumn, IntoLazy, JoinArgs, JoinType,
    NamedFrom, Series, SortMultipleOptions,
};
use std::collections::HashSet;

/// Suffix for a left-side column whose name collides with a right-side column in a join
pub const LEFT_SUFFIX: &str = "_x";
/// Suffix for a right-side column whose name collides with a left-side column in a join
pub const RIGHT_SUFFIX: &str = "_y";

const LEFT_ROW: &str = "__left_row";
const RIGHT_ROW: &str = "__right_row";
const LEFT_KEY: &str = "__left_key";
const RIGHT_KEY: &str = "__right_key";

/// Cell values of one column, as read from or written into a [`Table`]
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Identifiers and labels; `None` is missing
    Text(Vec<Option<String>>),
    /// Measures; `NaN` is missing
    Number(Vec<f64>),
}

impl Column {
    /// Build a text column with every cell present
    pub fn text<S: AsRef<str>>(values: &[S]) -> Self {
        Column::Text(
            values
                .iter()
                .map(|v| Some(AsRef::<str>::as_ref(v).to_string()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            Column::Number(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Cell as a key string. Numeric cells are formatted; missing cells yield `None`.
    pub fn key_at(&self, row: usize) -> Option<String> {
        match self {
            Column::Text(v) => v[row].clone(),
            Column::Number(v) => {
                let value = v[row];
                (!value.is_nan()).then(|| value.to_string())
            }
        }
    }

    /// Cell rendered for display or export; missing cells render empty
    pub fn display_at(&self, row: usize) -> String {
        self.key_at(row).unwrap_or_default()
    }

    fn into_series(self, name: &str) -> Series {
        match self {
            Column::Text(values) => Series::new(name.into(), values),
            Column::Number(values) => {
                let cells: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|v| (!v.is_nan()).then_some(v))
                    .collect();
                Series::new(name.into(), cells)
            }
        }
    }

    fn from_series(series: &Series) -> Column {
        if let Some(values) = float_values(series) {
            return Column::Number(values);
        }
        match series.cast(&DataType::String) {
            Ok(cast) => Column::Text(string_values(&cast)),
            Err(_) => Column::Text(vec![None; series.len()]),
        }
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    )
}

/// Numeric cells with nulls as `NaN`; `None` for non-numeric series
fn float_values(series: &Series) -> Option<Vec<f64>> {
    if !is_numeric(series.dtype()) {
        return None;
    }
    let cast = series.cast(&DataType::Float64).ok()?;
    let values = cast.f64().ok()?;
    Some(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn string_values(series: &Series) -> Vec<Option<String>> {
    match series.str() {
        Ok(values) => values.into_iter().map(|v| v.map(str::to_string)).collect(),
        Err(_) => vec![None; series.len()],
    }
}

/// Ordered collection of equally long named columns
#[derive(Debug, Clone, Default)]
pub struct Table {
    df: DataFrame,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.n_rows() == other.n_rows() && self.columns() == other.columns()
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self {
        Table { df }
    }
}

impl Table {
    /// Build a table, rejecting ragged columns and duplicate names
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(CbamError::DuplicateColumn(name.clone()));
            }
            if column.len() != n_rows {
                return Err(CbamError::ColumnLength {
                    column: name.clone(),
                    expected: n_rows,
                    actual: column.len(),
                });
            }
        }
        let series = columns
            .into_iter()
            .map(|(name, column)| column.into_series(&name).into_column())
            .collect();
        Ok(Table {
            df: DataFrame::new(series)?,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.df.height()
    }

    pub fn n_cols(&self) -> usize {
        self.df.width()
    }

    /// True when the table has no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.n_cols() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }

    /// Every column materialized, in table order
    pub fn columns(&self) -> Vec<(String, Column)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| {
                let series = c.as_materialized_series();
                (series.name().to_string(), Column::from_series(series))
            })
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.df
            .column(name)
            .ok()
            .map(|c| c.as_materialized_series())
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.series(name).map(Column::from_series)
    }

    /// Numeric cells with missing as `NaN`; `None` when absent or not numeric
    pub fn numbers(&self, name: &str) -> Option<Vec<f64>> {
        self.series(name).and_then(float_values)
    }

    /// Text cells; `None` when absent or numeric
    pub fn texts(&self, name: &str) -> Option<Vec<Option<String>>> {
        let series = self.series(name)?;
        (series.dtype() == &DataType::String).then(|| string_values(series))
    }

    /// Fail with `MissingColumns` unless every listed column is present
    pub fn require<S: AsRef<str>>(&self, names: &[S], dataset: &str) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CbamError::MissingColumns {
                dataset: dataset.to_string(),
                columns: missing,
            })
        }
    }

    /// Replace a column in place of the existing one, or append it
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if self.n_cols() > 0 && column.len() != self.n_rows() {
            return Err(CbamError::ColumnLength {
                column: name,
                expected: self.n_rows(),
                actual: column.len(),
            });
        }
        self.df.with_column(column.into_series(&name))?;
        Ok(self)
    }

    /// Drop the listed columns that are present; absent names are ignored
    pub fn drop_columns<S: AsRef<str>>(self, names: &[S]) -> Self {
        let present: Vec<&str> = names
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| self.has_column(name))
            .collect();
        if present.is_empty() {
            return self;
        }
        Table {
            df: self.df.drop_many(present),
        }
    }

    /// Rename columns by an old → new mapping; unmapped columns keep their names
    pub fn rename<S: AsRef<str>>(mut self, mapping: &[(S, S)]) -> Result<Self> {
        let renamed: Vec<String> = self
            .column_names()
            .into_iter()
            .map(|name| {
                mapping
                    .iter()
                    .find(|(old, _)| AsRef::<str>::as_ref(old) == name)
                    .map(|(_, new)| AsRef::<str>::as_ref(new))
                    .unwrap_or(name)
                    .to_string()
            })
            .collect();
        let mut seen = HashSet::new();
        if let Some(duplicate) = renamed.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(CbamError::DuplicateColumn(duplicate.clone()));
        }
        self.df.set_column_names(renamed)?;
        Ok(self)
    }

    /// Project onto the listed columns that are present, in the listed order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let present: Vec<&str> = names
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|name| self.has_column(name))
            .collect();
        Ok(Table {
            df: self.df.select(present)?,
        })
    }

    /// Stable sort by one column, missing values last. An absent column leaves the order unchanged.
    pub fn sort_by(&self, name: &str, descending: bool) -> Result<Table> {
        if !self.has_column(name) {
            tracing::warn!(column = name, "cannot sort by absent column");
            return Ok(self.clone());
        }
        let options = SortMultipleOptions::default()
            .with_order_descending(descending)
            .with_nulls_last(true)
            .with_maintain_order(true);
        Ok(Table {
            df: self.df.sort([name], options)?,
        })
    }

    /// Rows at the given positions, in the given order; out-of-range positions are an error
    pub fn take(&self, rows: &[usize]) -> Result<Table> {
        let indices = IdxCa::from_vec(
            "rows".into(),
            rows.iter().map(|&row| row as IdxSize).collect(),
        );
        Ok(Table {
            df: self.df.take(&indices)?,
        })
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            df: self.df.head(Some(n)),
        }
    }

    pub fn tail(&self, n: usize) -> Table {
        Table {
            df: self.df.tail(Some(n)),
        }
    }

    /// First row whose `column` key equals `value`
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let column = self.column(column)?;
        (0..column.len()).find(|&row| column.key_at(row).as_deref() == Some(value))
    }

    /// Fraction of all cells that are missing
    pub fn missing_fraction(&self) -> f64 {
        let cells = self.n_rows() * self.n_cols();
        if cells == 0 {
            return 0.0;
        }
        let missing: usize = self.df.get_columns().iter().map(|c| c.null_count()).sum();
        missing as f64 / cells as f64
    }

    /// Left join `right` onto this table.
    ///
    /// Every left row survives; a left row with no match gets missing right-side cells,
    /// and a left row matching several right rows is repeated once per match.
    /// When `left_on == right_on` the key appears once. Other name collisions get
    /// `_x` (left) and `_y` (right) suffixes. Keys compare as strings and missing keys
    /// never match. Output rows follow left order, then right order within a match.
    pub fn left_join(&self, right: &Table, left_on: &str, right_on: &str) -> Result<Table> {
        self.require(&[left_on], "left join input")?;
        right.require(&[right_on], "right join input")?;

        let shared_key = left_on == right_on;
        let right_side = if shared_key {
            right.clone().drop_columns(&[right_on])
        } else {
            right.clone()
        };

        let right_names = right_side.column_names_owned();
        let mut left_df = self.df.clone();
        let mut right_df = right_side.df;
        for name in right_names {
            if self.has_column(&name) {
                left_df.rename(&name, format!("{}{}", name, LEFT_SUFFIX).into())?;
                right_df.rename(&name, format!("{}{}", name, RIGHT_SUFFIX).into())?;
            }
        }

        let right_key = right.series(right_on).map(|s| s.cast(&DataType::String));
        let left_key = self.series(left_on).map(|s| s.cast(&DataType::String));
        let (Some(left_key), Some(right_key)) = (left_key, right_key) else {
            return Err(CbamError::MissingColumns {
                dataset: "join input".to_string(),
                columns: vec![left_on.to_string(), right_on.to_string()],
            });
        };
        left_df.with_column(left_key?.with_name(LEFT_KEY.into()))?;
        right_df.with_column(right_key?.with_name(RIGHT_KEY.into()))?;

        let keys = right_df
            .column(RIGHT_KEY)?
            .as_materialized_series()
            .drop_nulls();
        let duplicate_keys = keys.len() - keys.n_unique()?;
        if duplicate_keys > 0 {
            tracing::warn!(
                key = right_on,
                duplicate_rows = duplicate_keys,
                "join key repeats on the right side; matching left rows will be repeated"
            );
        }

        let left_df = left_df.with_row_index(LEFT_ROW.into(), None)?;
        let right_df = right_df.with_row_index(RIGHT_ROW.into(), None)?;
        let order = SortMultipleOptions::default()
            .with_nulls_last(true)
            .with_maintain_order(true);
        let joined = left_df
            .lazy()
            .join(
                right_df.lazy(),
                [col(LEFT_KEY)],
                [col(RIGHT_KEY)],
                JoinArgs::new(JoinType::Left),
            )
            .collect()?
            .sort([LEFT_ROW, RIGHT_ROW], order)?;

        Ok(Table::from(joined).drop_columns(&[LEFT_ROW, RIGHT_ROW, LEFT_KEY, RIGHT_KEY]))
    }

    fn column_names_owned(&self) -> Vec<String> {
        self.column_names().into_iter().map(str::to_string).collect()
    }
}

/// Element-wise ratio; a zero or missing operand yields `NaN`
pub fn ratio(numerator: &[f64], denominator: &[f64]) -> Vec<f64> {
    numerator
        .iter()
        .zip(denominator)
        .map(|(&n, &d)| {
            if n.is_nan() || d.is_nan() || d == 0.0 {
                f64::NAN
            } else {
                n / d
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries(codes: &[&str], values: &[f64]) -> Table {
        Table::new(vec![
            ("Country Code".to_string(), Column::text(codes)),
            ("Value".to_string(), Column::Number(values.to_vec())),
        ])
        .unwrap()
    }

    fn codes(table: &Table) -> Vec<String> {
        table
            .texts("Country Code")
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = Table::new(vec![
            ("a".to_string(), Column::Number(vec![1.0, 2.0])),
            ("b".to_string(), Column::Number(vec![1.0])),
        ]);
        assert!(matches!(result, Err(CbamError::ColumnLength { .. })));
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = Table::new(vec![
            ("a".to_string(), Column::Number(vec![1.0])),
            ("a".to_string(), Column::Number(vec![2.0])),
        ]);
        assert!(matches!(result, Err(CbamError::DuplicateColumn(_))));
    }

    #[test]
    fn test_missing_numbers_read_back_as_nan() {
        let table = countries(&["A", "B"], &[1.0, f64::NAN]);
        let values = table.numbers("Value").unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert!(table.texts("Value").is_none());
        assert!(table.numbers("Country Code").is_none());
    }

    #[test]
    fn test_with_column_replaces_in_place() {
        let table = countries(&["A"], &[1.0])
            .with_column("Country Code", Column::text(&["B"]))
            .unwrap();
        assert_eq!(table.column_names(), vec!["Country Code", "Value"]);
        assert_eq!(codes(&table), vec!["B"]);
    }

    #[test]
    fn test_drop_columns_ignores_absent_names() {
        let table = countries(&["USA"], &[1.0]).drop_columns(&["Value", "Nope"]);
        assert_eq!(table.column_names(), vec!["Country Code"]);
        assert_eq!(table.n_rows(), 1);
    }

    #[test]
    fn test_rename_collision_is_an_error() {
        let table = countries(&["USA"], &[1.0]);
        assert!(table.rename(&[("Value", "Country Code")]).is_err());
    }

    #[test]
    fn test_select_keeps_listed_order() {
        let table = countries(&["USA"], &[1.0]).select(&["Value", "Nope", "Country Code"]).unwrap();
        assert_eq!(table.column_names(), vec!["Value", "Country Code"]);
    }

    #[test]
    fn test_sort_is_stable_with_missing_last() {
        let table = countries(&["A", "B", "C", "D"], &[1.0, f64::NAN, 3.0, 1.0]);
        let desc = table.sort_by("Value", true).unwrap();
        assert_eq!(codes(&desc), vec!["C", "A", "D", "B"]);
        let asc = table.sort_by("Value", false).unwrap();
        assert_eq!(codes(&asc), vec!["A", "D", "C", "B"]);
    }

    #[test]
    fn test_left_join_keeps_every_left_row() {
        let left = countries(&["USA", "CHN", "FRA"], &[1.0, 2.0, 3.0]);
        let right = Table::new(vec![
            ("Country Code".to_string(), Column::text(&["FRA", "DEU"])),
            ("Other".to_string(), Column::Number(vec![30.0, 40.0])),
        ])
        .unwrap();
        let joined = left.left_join(&right, "Country Code", "Country Code").unwrap();
        assert_eq!(joined.n_rows(), 3);
        assert_eq!(joined.column_names(), vec!["Country Code", "Value", "Other"]);
        assert_eq!(codes(&joined), vec!["USA", "CHN", "FRA"]);
        let other = joined.numbers("Other").unwrap();
        assert!(other[0].is_nan());
        assert!(other[1].is_nan());
        assert_eq!(other[2], 30.0);
    }

    #[test]
    fn test_left_join_suffixes_collisions() {
        let left = countries(&["USA"], &[1.0]);
        let right = countries(&["USA"], &[2.0]);
        let joined = left.left_join(&right, "Country Code", "Country Code").unwrap();
        assert_eq!(joined.column_names(), vec!["Country Code", "Value_x", "Value_y"]);
        assert_eq!(joined.numbers("Value_y").unwrap(), &[2.0]);
    }

    #[test]
    fn test_left_join_cross_key_keeps_both_keys() {
        let left = countries(&["USA"], &[1.0]);
        let right = Table::new(vec![
            ("ReporterISO".to_string(), Column::text(&["USA"])),
            ("Ratio".to_string(), Column::Number(vec![0.5])),
        ])
        .unwrap();
        let joined = left.left_join(&right, "Country Code", "ReporterISO").unwrap();
        assert_eq!(
            joined.column_names(),
            vec!["Country Code", "Value", "ReporterISO", "Ratio"]
        );
        assert_eq!(joined.numbers("Ratio").unwrap(), &[0.5]);
    }

    #[test]
    fn test_left_join_repeats_left_row_for_duplicated_right_key() {
        let left = countries(&["USA", "CHN"], &[1.0, 2.0]);
        let right = Table::new(vec![
            ("Country Code".to_string(), Column::text(&["USA", "USA"])),
            ("Other".to_string(), Column::Number(vec![10.0, 20.0])),
        ])
        .unwrap();
        let joined = left.left_join(&right, "Country Code", "Country Code").unwrap();
        assert_eq!(joined.n_rows(), 3);
        assert_eq!(codes(&joined), vec!["USA", "USA", "CHN"]);
        let other = joined.numbers("Other").unwrap();
        assert_eq!(&other[..2], &[10.0, 20.0]);
        assert!(other[2].is_nan());
    }

    #[test]
    fn test_missing_keys_never_match() {
        let left = Table::new(vec![
            ("k".to_string(), Column::Text(vec![None])),
            ("a".to_string(), Column::Number(vec![1.0])),
        ])
        .unwrap();
        let right = Table::new(vec![
            ("k".to_string(), Column::Text(vec![None])),
            ("b".to_string(), Column::Number(vec![2.0])),
        ])
        .unwrap();
        let joined = left.left_join(&right, "k", "k").unwrap();
        assert_eq!(joined.n_rows(), 1);
        assert!(joined.numbers("b").unwrap()[0].is_nan());
    }

    #[test]
    fn test_ratio_zero_and_missing_denominator() {
        let out = ratio(&[50.0, 1.0, 1.0, f64::NAN], &[200.0, 0.0, f64::NAN, 2.0]);
        assert_eq!(out[0], 0.25);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
    }

    #[test]
    fn test_take_reorders_and_repeats_rows() {
        let table = countries(&["A", "B", "C"], &[1.0, 2.0, 3.0]);
        let taken = table.take(&[2, 0, 2]).unwrap();
        assert_eq!(codes(&taken), vec!["C", "A", "C"]);
        assert_eq!(taken.numbers("Value").unwrap(), &[3.0, 1.0, 3.0]);
        assert!(table.take(&[3]).is_err());
    }

    #[test]
    fn test_head_tail_and_missing_fraction() {
        let table = countries(&["A", "B", "C"], &[1.0, f64::NAN, 3.0]);
        assert_eq!(table.head(2).n_rows(), 2);
        assert_eq!(table.tail(5).n_rows(), 3);
        assert!((table.missing_fraction() - 1.0 / 6.0).abs() < 1e-12);
    }
}
