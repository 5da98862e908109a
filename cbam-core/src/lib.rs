//! CBAM core library - country-level exposure risk index for the EU Carbon Border Adjustment Mechanism

// Global invariants enforced in this crate:
// - No global mutable state; configuration is resolved once and passed by reference
// - Every transform returns a new table; nothing is mutated in place
// - Left joins never drop anchor rows
// - Missing values propagate as NaN/None and never become errors after cleaning
// - Sorting is stable with missing values last, so identical input yields identical output

pub mod clean;
pub mod config;
pub mod error;
pub mod features;
pub mod html;
pub mod loader;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod risk;
pub mod scoring;
pub mod source;
pub mod stats;
pub mod table;

pub use config::ResolvedConfig;
pub use error::CbamError;
pub use loader::DataLoader;
pub use pipeline::{prepare_all, run_pipeline, PipelineOutput};
pub use report::{render_json, render_text, RiskReport};
pub use scoring::WeightScenario;
pub use source::SourceKey;
pub use table::{Column, Table};
