//! Descriptive statistics over columns with missing values
//!
//! Every function excludes `NaN` cells. An input with too few present values
//! yields `NaN` rather than an error.

use crate::error::Result;
use polars::prelude::{
    col, ChunkAgg, ChunkQuantile, ChunkVar, DataFrame, DataType, Float64Chunked, IntoColumn,
    IntoLazy, NamedFrom, QuantileMethod, RankMethod, RankOptions, Series,
};

/// Present values as a null-free chunked array
fn chunked(values: &[f64]) -> Float64Chunked {
    values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| Some(v))
        .collect()
}

pub fn count(values: &[f64]) -> usize {
    values.iter().filter(|v| !v.is_nan()).count()
}

pub fn mean(values: &[f64]) -> f64 {
    chunked(values).mean().unwrap_or(f64::NAN)
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> f64 {
    if count(values) < 2 {
        return f64::NAN;
    }
    chunked(values).std(1).unwrap_or(f64::NAN)
}

pub fn min(values: &[f64]) -> f64 {
    chunked(values).min().unwrap_or(f64::NAN)
}

pub fn max(values: &[f64]) -> f64 {
    chunked(values).max().unwrap_or(f64::NAN)
}

/// Quantile with linear interpolation between closest ranks, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    chunked(values)
        .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
        .unwrap_or(f64::NAN)
}

pub fn median(values: &[f64]) -> f64 {
    chunked(values).median().unwrap_or(f64::NAN)
}

/// Pearson correlation over rows where both values are present
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xs.len() < 2 {
        return f64::NAN;
    }
    let xs = chunked(&xs);
    let ys = chunked(&ys);
    let (Some(mx), Some(my)) = (xs.mean(), ys.mean()) else {
        return f64::NAN;
    };
    let dx = &xs - mx;
    let dy = &ys - my;
    let cov = (&dx * &dy).sum().unwrap_or(0.0);
    let vx = (&dx * &dx).sum().unwrap_or(0.0);
    let vy = (&dy * &dy).sum().unwrap_or(0.0);
    if vx == 0.0 || vy == 0.0 {
        return f64::NAN;
    }
    (cov / (vx * vy).sqrt()).clamp(-1.0, 1.0)
}

/// Competition ranking: tied values share the lowest rank of their group.
/// Missing values stay unranked (`NaN`).
pub fn competition_rank(values: &[f64], descending: bool) -> Result<Vec<f64>> {
    let cells: Vec<Option<f64>> = values.iter().map(|&v| (!v.is_nan()).then_some(v)).collect();
    let frame = DataFrame::new(vec![Series::new("value".into(), cells).into_column()])?;
    let options = RankOptions {
        method: RankMethod::Min,
        descending,
    };
    let ranked = frame
        .lazy()
        .select([col("value")
            .rank(options, None)
            .cast(DataType::Float64)
            .alias("rank")])
        .collect()?;
    let ranks = ranked.column("rank")?.as_materialized_series().f64()?.clone();
    Ok(ranks.into_iter().map(|r| r.unwrap_or(f64::NAN)).collect())
}
