//! CBAM CLI - build, rank and report the CBAM exposure risk index

// Global invariants enforced:
// - Logs go to stderr; stdout carries only the rendered result
// - CLI flags take precedence over config file values

use anyhow::Context;
use cbam_core::config::{self, ResolvedConfig};
use cbam_core::report::{
    country_column, export_csv, render_drivers_json, render_drivers_text, render_table_text,
};
use cbam_core::scoring::risk_drivers;
use cbam_core::{html, render_json, render_text, run_pipeline, DataLoader, PipelineOutput};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cbam")]
#[command(about = "Country-level CBAM exposure risk index")]
#[command(version = env!("CBAM_VERSION"))]
struct Cli {
    /// Log pipeline steps (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the comprehensive table and score every weight scenario
    Analyze {
        /// Directory holding the raw CSV datasets
        data_dir: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Output file path (for HTML format, default: cbam-report.html)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of highest-risk countries to report (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Scenario used for ranking and categories (default: first configured)
        #[arg(long)]
        scenario: Option<String>,

        /// Also write the ranked table as CSV to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Show the component breakdown for one country
    Drivers {
        /// Directory holding the raw CSV datasets
        data_dir: PathBuf,

        /// Country name (or code when the data carries no names)
        #[arg(long)]
        country: String,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running analysis
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Html,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            data_dir,
            format,
            output,
            config: config_path,
            top,
            scenario,
            export,
        } => {
            let mut resolved = load_config(config_path.as_deref())?;
            if let Some(top) = top {
                if top == 0 {
                    anyhow::bail!("--top must be at least 1");
                }
                resolved.top_n = top;
            }
            if let Some(name) = scenario {
                promote_scenario(&mut resolved, &name)?;
            }

            let result = run(&data_dir, &resolved)?;

            if let Some(path) = export {
                export_csv(&result.ranked, &path)?;
                eprintln!("Exported results to {}", path.display());
            }

            match format {
                OutputFormat::Text => {
                    let mut text = render_text(&result.report);
                    text.push_str("\nScenario comparison\n");
                    text.push_str(&render_table_text(
                        &result.comparison,
                        &result.comparison.column_names(),
                    ));
                    emit(output.as_deref(), &text)?;
                }
                OutputFormat::Json => {
                    emit(output.as_deref(), &format!("{}\n", render_json(&result.report)))?;
                }
                OutputFormat::Html => {
                    let path = output.unwrap_or_else(|| PathBuf::from("cbam-report.html"));
                    write_html_report(&path, &html::render_html(&result))?;
                    eprintln!("HTML report written to {}", path.display());
                }
            }
        }
        Commands::Drivers {
            data_dir,
            country,
            config: config_path,
            format,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let result = run(&data_dir, &resolved)?;
            let country_col = country_column(&result.scored);
            let drivers = risk_drivers(
                &result.scored,
                &country,
                &resolved.component_columns(),
                country_col,
            );

            match format {
                OutputFormat::Text => print!("{}", render_drivers_text(&country, &drivers)),
                OutputFormat::Json => println!("{}", render_drivers_json(&drivers)),
                OutputFormat::Html => anyhow::bail!("HTML format is only available for analyze"),
            }
            if drivers.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

/// stderr logging; RUST_LOG wins over --verbose
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let project_root = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&project_root, config_path)
        .context("failed to load configuration")?;
    if let Some(path) = &resolved.config_path {
        eprintln!("Using config: {}", path.display());
    }
    Ok(resolved)
}

/// Move the named scenario to the front so it becomes the primary index
fn promote_scenario(resolved: &mut ResolvedConfig, name: &str) -> anyhow::Result<()> {
    let Some(pos) = resolved.scenarios.iter().position(|s| s.name == name) else {
        let available: Vec<&str> = resolved.scenarios.iter().map(|s| s.name.as_str()).collect();
        anyhow::bail!(
            "unknown scenario: {} (available: {})",
            name,
            available.join(", ")
        );
    };
    let chosen = resolved.scenarios.remove(pos);
    resolved.scenarios.insert(0, chosen);
    Ok(())
}

fn run(data_dir: &Path, resolved: &ResolvedConfig) -> anyhow::Result<PipelineOutput> {
    tracing::info!(
        data_dir = %data_dir.display(),
        scenarios = resolved.scenarios.len(),
        "starting analysis"
    );
    let loader = DataLoader::new(data_dir, resolved)?;
    run_pipeline(&loader, resolved)
}

/// Write to `path` when given, otherwise to stdout
fn emit(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write output file: {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Datasets:");
    for (key, file) in &resolved.datasets {
        println!("  {}: {}", key, file);
    }
    println!();
    println!("Analysis columns: {}", resolved.analysis_columns.join(", "));
    println!(
        "Complement columns: {}",
        resolved.complement_columns.join(", ")
    );
    println!();
    println!("Scenarios:");
    for scenario in &resolved.scenarios {
        let weights = scenario
            .weights
            .iter()
            .map(|(column, weight)| format!("{}={}", column, weight))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {}: {}", scenario.name, weights);
    }
    println!();
    println!("Thresholds:");
    match &resolved.thresholds {
        Some(thresholds) => {
            for (category, bound) in thresholds.buckets() {
                println!("  {}: {}", category, bound);
            }
        }
        None => println!("  percentile (33% / 66% / max)"),
    }
    println!();
    println!("Report:");
    println!("  top: {}", resolved.top_n);
    println!("  bottom: {}", resolved.bottom_n);
    println!("  compare_top: {}", resolved.compare_top_n);
}

fn write_html_report(path: &Path, html: &str) -> anyhow::Result<()> {
    use std::fs;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    // Atomic write (temp + rename pattern)
    let temp_path = path.with_extension("html.tmp");
    fs::write(&temp_path, html)
        .with_context(|| format!("Failed to write temporary file: {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temporary file to: {}", path.display()))?;

    Ok(())
}
