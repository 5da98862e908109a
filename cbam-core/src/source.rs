//! Logical dataset keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the eight raw sources feeding the comprehensive table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKey {
    CbamExports,
    Gdp,
    TotalExports,
    CarbonIntensity,
    Spi,
    Patents,
    Population,
    TradeElasticity,
}

impl SourceKey {
    /// All sources in registry order
    pub const ALL: [SourceKey; 8] = [
        SourceKey::CbamExports,
        SourceKey::Gdp,
        SourceKey::TotalExports,
        SourceKey::CarbonIntensity,
        SourceKey::Spi,
        SourceKey::Patents,
        SourceKey::Population,
        SourceKey::TradeElasticity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::CbamExports => "cbam_exports",
            SourceKey::Gdp => "gdp",
            SourceKey::TotalExports => "total_exports",
            SourceKey::CarbonIntensity => "carbon_intensity",
            SourceKey::Spi => "spi",
            SourceKey::Patents => "patents",
            SourceKey::Population => "population",
            SourceKey::TradeElasticity => "trade_elasticity",
        }
    }

    pub fn parse(key: &str) -> Option<SourceKey> {
        SourceKey::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// File name used when no config overrides it
    pub fn default_filename(&self) -> &'static str {
        match self {
            SourceKey::CbamExports => "CBAM Exports 2019.csv",
            SourceKey::Gdp => "GDP East Asia - Pacific 2019.csv",
            SourceKey::TotalExports => "Total Exports 2019.csv",
            SourceKey::CarbonIntensity => "Carbon Intensity.csv",
            SourceKey::Spi => "Statistical Performance Indicator.csv",
            SourceKey::Patents => "Total patent applications.csv",
            SourceKey::Population => "Population 2019.csv",
            SourceKey::TradeElasticity => "Trade elasticities.csv",
        }
    }

    /// Comma-separated list of every key, for error messages
    pub fn available() -> String {
        SourceKey::ALL
            .iter()
            .map(SourceKey::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
