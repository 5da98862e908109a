//! Feature engineering: min-max normalization and complementary scores

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::stats;
use crate::table::{Column, Table};

pub const COMPLEMENT_SUFFIX: &str = "_Compl";

/// Rescale each listed numeric column to [0, 1] using its observed min and max.
///
/// Missing cells are excluded from the bounds and stay missing. A constant column
/// maps every present value to 0.0.
pub fn normalize<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Table> {
    let mut result = table.clone();
    let mut normalized = 0usize;

    for name in columns.iter().map(AsRef::<str>::as_ref) {
        let Some(column) = table.column(name) else {
            tracing::warn!(column = name, "column to normalize not found; skipped");
            continue;
        };
        let Some(values) = column.as_numbers() else {
            tracing::warn!(column = name, "column to normalize is not numeric; skipped");
            continue;
        };

        let (lo, hi) = (stats::min(values), stats::max(values));
        let span = hi - lo;
        let scaled = values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    f64::NAN
                } else if span == 0.0 {
                    0.0
                } else {
                    (v - lo) / span
                }
            })
            .collect();
        result = result.with_column(name, Column::Number(scaled))?;
        normalized += 1;
    }

    tracing::info!(columns = normalized, "normalized columns");
    Ok(result)
}

/// Add `<col>_Compl = 1 - <col>` for each listed column present
pub fn complement<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Table> {
    let mut result = table.clone();
    for name in columns.iter().map(AsRef::<str>::as_ref) {
        let Some(values) = table.numbers(name) else {
            tracing::warn!(column = name, "column to complement not found; skipped");
            continue;
        };
        let inverted = values.iter().map(|v| 1.0 - v).collect();
        let out = format!("{}{}", name, COMPLEMENT_SUFFIX);
        tracing::info!(column = %out, "created complementary column");
        result = result.with_column(out, Column::Number(inverted))?;
    }
    Ok(result)
}

/// Normalize the configured analysis columns, then derive their complements
pub fn engineer_features(table: &Table, config: &ResolvedConfig) -> Result<Table> {
    let normalized = normalize(table, &config.analysis_columns)?;
    complement(&normalized, &config.complement_columns)
}
