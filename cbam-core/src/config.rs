//! Configuration file support
//!
//! Loads project-specific overrides from JSON files and resolves them into an
//! immutable [`ResolvedConfig`] that is passed explicitly into every pipeline stage.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.cbamrc.json` in project root
//! 3. `cbam.config.json` in project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::risk::RiskThresholds;
use crate::scoring::WeightScenario;
use crate::source::SourceKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// UN Comtrade metadata columns with no bearing on the index
pub const COMTRADE_COLUMNS_TO_REMOVE: &[&str] = &[
    "PartnerISO",
    "CmdCode",
    "TypeCode",
    "FreqCode",
    "RefPeriodId",
    "RefYear",
    "RefMonth",
    "Period",
    "ReporterCode",
    "ReporterDesc",
    "FlowCode",
    "FlowDesc",
    "PartnerCode",
    "PartnerDesc",
    "Partner2Code",
    "Partner2ISO",
    "Partner2Desc",
    "ClassificationCode",
    "ClassificationSearchCode",
    "IsOriginalClassification",
    "CmdDesc",
    "AggrLevel",
    "IsLeaf",
    "CustomsCode",
    "CustomsDesc",
    "MosCode",
    "MotCode",
    "MotDesc",
    "QtyUnitCode",
    "QtyUnitAbbr",
    "Qty",
    "IsQtyEstimated",
    "AltQtyUnitCode",
    "AltQtyUnitAbbr",
    "AtlQty",
    "IsAltQtyEstimated",
    "NetWgt",
    "IsNetWgtEstimated",
    "GrossWgt",
    "IsGrossWgtEstimated",
    "Cifvalue",
    "Fobvalue",
    "LegacyEstimationFlag",
    "IsReported",
    "IsAggregate",
    "Unnamed: 47",
];

/// Columns rescaled to [0, 1] before scoring
pub const ANALYSIS_COLUMNS: &[&str] = &[
    "Carbon_Intensity",
    "PctExpCBAM",
    "ExpCBAMperGDP",
    "SPI_Score",
    "PatPerCap",
    "Trade_Elast",
];

/// Metrics where a higher raw value means lower risk
pub const COMPLEMENT_COLUMNS: &[&str] = &["SPI_Score", "PatPerCap"];

pub const TO_MILLIONS: f64 = 1e6;
pub const TO_HUNDRED_THOUSANDS: f64 = 1e5;

/// Yearly patent columns summed into the 2019 total
pub const PATENT_YEARS: RangeInclusive<u32> = 1995..=2019;

const DEFAULT_TOP: usize = 5;
const DEFAULT_BOTTOM: usize = 5;
const DEFAULT_COMPARE_TOP: usize = 10;

/// Fixed old → new column names per source
pub fn default_renames(source: SourceKey) -> &'static [(&'static str, &'static str)] {
    match source {
        SourceKey::CarbonIntensity => &[("Carbon Intensity [gCO2e]", "Carbon_Intensity")],
        SourceKey::Spi => &[("2019 [YR2019]", "SPI_Score")],
        SourceKey::Patents => &[("Office (Code)", "Country Code"), ("Office", "Country Name")],
        SourceKey::Population => &[("2019 [YR2019]", "Population_2019")],
        SourceKey::TradeElasticity => &[("TE", "Trade_Elast")],
        SourceKey::CbamExports | SourceKey::Gdp | SourceKey::TotalExports => &[],
    }
}

/// The six weighting schemes used for sensitivity analysis
pub fn default_scenarios() -> Vec<WeightScenario> {
    vec![
        WeightScenario::new(
            "baseline",
            &[
                ("ExpCBAMperGDP", 0.30),
                ("PctExpCBAM", 0.14),
                ("Trade_Elast", 0.14),
                ("Carbon_Intensity", 0.14),
                ("SPI_Score_Compl", 0.14),
                ("PatPerCap_Compl", 0.14),
            ],
        ),
        WeightScenario::new(
            "equal_weights",
            &[
                ("ExpCBAMperGDP", 0.166),
                ("PctExpCBAM", 0.166),
                ("Trade_Elast", 0.166),
                ("Carbon_Intensity", 0.166),
                ("SPI_Score_Compl", 0.166),
                ("PatPerCap_Compl", 0.166),
            ],
        ),
        WeightScenario::new(
            "export_focused",
            &[
                ("PctExpCBAM", 0.30),
                ("ExpCBAMperGDP", 0.14),
                ("Trade_Elast", 0.14),
                ("Carbon_Intensity", 0.14),
                ("SPI_Score_Compl", 0.14),
                ("PatPerCap_Compl", 0.14),
            ],
        ),
        WeightScenario::new(
            "no_innovation",
            &[
                ("ExpCBAMperGDP", 0.30),
                ("PctExpCBAM", 0.175),
                ("Trade_Elast", 0.175),
                ("Carbon_Intensity", 0.175),
                ("SPI_Score_Compl", 0.175),
            ],
        ),
        WeightScenario::new(
            "no_trade_stat",
            &[
                ("ExpCBAMperGDP", 0.30),
                ("PctExpCBAM", 0.23),
                ("Carbon_Intensity", 0.23),
                ("PatPerCap_Compl", 0.23),
            ],
        ),
        WeightScenario::new(
            "no_trade_innovation",
            &[
                ("ExpCBAMperGDP", 0.30),
                ("PctExpCBAM", 0.23),
                ("Carbon_Intensity", 0.23),
                ("SPI_Score_Compl", 0.23),
            ],
        ),
    ]
}

/// Configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CbamConfig {
    /// File name overrides keyed by dataset key (e.g. `"gdp": "gdp_2019.csv"`)
    #[serde(default)]
    pub datasets: BTreeMap<String, String>,

    /// Columns to normalize (default: the six analysis metrics)
    #[serde(default)]
    pub analysis_columns: Option<Vec<String>>,

    /// Normalized columns that get a `_Compl` counterpart (default: SPI_Score, PatPerCap)
    #[serde(default)]
    pub complement_columns: Option<Vec<String>>,

    /// Weight scenarios; replaces the defaults entirely when present
    #[serde(default)]
    pub scenarios: Option<Vec<WeightScenario>>,

    /// Fixed category thresholds (default: 33rd/66th percentile and max of the index)
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,

    /// Number of highest-risk countries in the report (default: 5)
    #[serde(default)]
    pub top: Option<usize>,

    /// Number of lowest-risk countries in the report (default: 5)
    #[serde(default)]
    pub bottom: Option<usize>,

    /// Number of countries kept by the scenario comparison (default: 10)
    #[serde(default)]
    pub compare_top: Option<usize>,
}

/// Fixed risk category thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Resolved, immutable configuration
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Dataset registry: logical key → file name
    pub datasets: BTreeMap<SourceKey, String>,
    pub comtrade_columns_to_remove: Vec<String>,
    pub renames: BTreeMap<SourceKey, Vec<(String, String)>>,
    pub analysis_columns: Vec<String>,
    pub complement_columns: Vec<String>,
    pub scenarios: Vec<WeightScenario>,
    /// Fixed thresholds; `None` means percentile-based
    pub thresholds: Option<RiskThresholds>,
    pub patent_years: RangeInclusive<u32>,
    pub top_n: usize,
    pub bottom_n: usize,
    pub compare_top_n: usize,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl CbamConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        for key in self.datasets.keys() {
            if SourceKey::parse(key).is_none() {
                anyhow::bail!(
                    "datasets.{} is not a known dataset key (available: {})",
                    key,
                    SourceKey::available()
                );
            }
        }
        for (key, file) in &self.datasets {
            if file.trim().is_empty() {
                anyhow::bail!("datasets.{} must name a file", key);
            }
        }

        if let Some(ref columns) = self.analysis_columns {
            if columns.is_empty() {
                anyhow::bail!("analysis_columns must not be empty");
            }
        }

        if let Some(ref scenarios) = self.scenarios {
            if scenarios.is_empty() {
                anyhow::bail!("scenarios must contain at least one scenario");
            }
            let mut seen = std::collections::HashSet::new();
            for scenario in scenarios {
                if scenario.name.trim().is_empty() {
                    anyhow::bail!("scenario names must not be empty");
                }
                if !seen.insert(scenario.name.as_str()) {
                    anyhow::bail!("duplicate scenario name: {}", scenario.name);
                }
                if scenario.weights.is_empty() {
                    anyhow::bail!("scenario {} has no weights", scenario.name);
                }
                for (column, weight) in &scenario.weights {
                    if !weight.is_finite() || *weight < 0.0 {
                        anyhow::bail!(
                            "scenarios.{}.{} must be a non-negative number (got {})",
                            scenario.name,
                            column,
                            weight
                        );
                    }
                }
            }
        }

        if let Some(ref t) = self.thresholds {
            for (name, value) in [("low", t.low), ("medium", t.medium), ("high", t.high)] {
                if !value.is_finite() {
                    anyhow::bail!("thresholds.{} must be finite (got {})", name, value);
                }
            }
            if t.low >= t.medium {
                anyhow::bail!(
                    "thresholds.low ({}) must be less than thresholds.medium ({})",
                    t.low,
                    t.medium
                );
            }
            if t.medium >= t.high {
                anyhow::bail!(
                    "thresholds.medium ({}) must be less than thresholds.high ({})",
                    t.medium,
                    t.high
                );
            }
        }

        for (name, value) in [
            ("top", self.top),
            ("bottom", self.bottom),
            ("compare_top", self.compare_top),
        ] {
            if value == Some(0) {
                anyhow::bail!("{} must be at least 1", name);
            }
        }

        Ok(())
    }

    /// Resolve config into the form passed to the pipeline
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let datasets = SourceKey::ALL
            .into_iter()
            .map(|key| {
                let file = self
                    .datasets
                    .get(key.as_str())
                    .cloned()
                    .unwrap_or_else(|| key.default_filename().to_string());
                (key, file)
            })
            .collect();

        let renames = SourceKey::ALL
            .into_iter()
            .map(|key| {
                let pairs = default_renames(key)
                    .iter()
                    .map(|(old, new)| (old.to_string(), new.to_string()))
                    .collect();
                (key, pairs)
            })
            .collect();

        let analysis_columns = self
            .analysis_columns
            .clone()
            .unwrap_or_else(|| to_strings(ANALYSIS_COLUMNS));
        let complement_columns = self
            .complement_columns
            .clone()
            .unwrap_or_else(|| to_strings(COMPLEMENT_COLUMNS));
        let scenarios = self.scenarios.clone().unwrap_or_else(default_scenarios);

        let thresholds = self
            .thresholds
            .as_ref()
            .map(|t| RiskThresholds::low_medium_high(t.low, t.medium, t.high));

        Ok(ResolvedConfig {
            datasets,
            comtrade_columns_to_remove: to_strings(COMTRADE_COLUMNS_TO_REMOVE),
            renames,
            analysis_columns,
            complement_columns,
            scenarios,
            thresholds,
            patent_years: PATENT_YEARS,
            top_n: self.top.unwrap_or(DEFAULT_TOP),
            bottom_n: self.bottom.unwrap_or(DEFAULT_BOTTOM),
            compare_top_n: self.compare_top.unwrap_or(DEFAULT_COMPARE_TOP),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        CbamConfig::default().resolve()
    }

    /// Rename mapping for one source (empty when the source needs none)
    pub fn renames_for(&self, source: SourceKey) -> &[(String, String)] {
        self.renames.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve a logical key against the registry
    pub fn dataset_file(&self, key: &str) -> Option<(SourceKey, &str)> {
        let source = SourceKey::parse(key)?;
        self.datasets.get(&source).map(|f| (source, f.as_str()))
    }

    /// Scenario index column names, in scenario order
    pub fn index_columns(&self) -> Vec<String> {
        self.scenarios.iter().map(WeightScenario::index_column).collect()
    }

    /// Every column a scenario can weight: analysis columns plus complements
    pub fn component_columns(&self) -> Vec<String> {
        let mut columns = self.analysis_columns.clone();
        columns.extend(self.complement_columns.iter().map(|c| format!("{}_Compl", c)));
        columns
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Discover and load a config file from the project root
///
/// Search order:
/// 1. `.cbamrc.json`
/// 2. `cbam.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(CbamConfig, PathBuf)>> {
    for name in [".cbamrc.json", "cbam.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<CbamConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: CbamConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (CbamConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    tracing::info!(
        source = %resolved
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string()),
        scenarios = resolved.scenarios.len(),
        "configuration resolved"
    );
    Ok(resolved)
}
