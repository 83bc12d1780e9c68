//! Folio CLI — backtests, comparisons and target runs over a workspace.
//!
//! Commands:
//! - `backtest` — simulate one model portfolio and publish its report
//! - `compare` — backtest several portfolios in parallel and summarise them
//! - `allocate` — definition-driven instrument targets for a named portfolio
//! - `waterfall` — equal-weight instrument targets from a hierarchy CSV
//! - `config normalize` / `config check` — inspect engine configurations
//!
//! Logging goes to stderr; set `RUST_LOG` to override the default
//! `warn,folio=info` filter.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_core::config::{load_raw_config, normalize_config, parse_engine_config};
use folio_core::pipeline::build_pipeline;
use folio_core::SchemaVersion;
use folio_runner::export::{
    export_comparison_json, export_dataset_csv, export_instrument_targets_csv,
};
use folio_runner::sink::write_gated;
use folio_runner::{
    compare, run_backtest, run_instrument_waterfall, run_portfolio_targets, BacktestResult,
    DirectorySink, ReportSink, RootWritePolicy, SystemMode, Workspace,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio CLI — model-portfolio simulation and allocation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one model portfolio and publish its report.
    Backtest {
        /// Portfolio id from portfolio_templates.csv (`-` and `_` are equivalent).
        #[arg(long)]
        strategy: String,

        /// System mode: capital or research.
        #[arg(long, default_value = "capital")]
        mode: SystemMode,

        /// Workspace root.
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Also write the canonical dataset CSV to this path.
        #[arg(long)]
        output_dataset_path: Option<PathBuf>,

        /// Skip writing the report under outputs/<mode>/runs.
        #[arg(long, default_value_t = false)]
        no_publish: bool,
    },
    /// Backtest several portfolios and compare rolling 5-year CAGR.
    Compare {
        /// Portfolio ids; pass at least two.
        #[arg(long = "strategy", required = true)]
        strategies: Vec<String>,

        #[arg(long, default_value = "capital")]
        mode: SystemMode,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Write the comparison as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Build instrument targets for a named portfolio definition.
    Allocate {
        #[arg(long)]
        portfolio_name: String,

        #[arg(long, default_value = "capital")]
        mode: SystemMode,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Equal-weight instrument targets from an instrument hierarchy CSV.
    Waterfall {
        /// Defaults to inputs/instrument_hierarchy.csv under the root.
        #[arg(long)]
        hierarchy: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Write the CSV here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Engine configuration utilities.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the canonical (v1) form of a config file as JSON.
    Normalize { path: PathBuf },
    /// Parse a config file, build its pipeline and print its fingerprint.
    Check { path: PathBuf },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            strategy,
            mode,
            root,
            output_dataset_path,
            no_publish,
        } => run_backtest_cmd(&root, &strategy, mode, output_dataset_path, no_publish),
        Commands::Compare {
            strategies,
            mode,
            root,
            output,
        } => run_compare_cmd(&root, &strategies, mode, output),
        Commands::Allocate {
            portfolio_name,
            mode,
            root,
        } => run_allocate_cmd(&root, &portfolio_name, mode),
        Commands::Waterfall {
            hierarchy,
            root,
            output,
        } => run_waterfall_cmd(&root, hierarchy, output),
        Commands::Config { action } => match action {
            ConfigAction::Normalize { path } => run_config_normalize(&path),
            ConfigAction::Check { path } => run_config_check(&path),
        },
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,folio=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_workspace(root: &Path) -> Result<Workspace> {
    Workspace::open(root).with_context(|| format!("failed to open workspace {}", root.display()))
}

fn run_backtest_cmd(
    root: &Path,
    strategy: &str,
    mode: SystemMode,
    output_dataset_path: Option<PathBuf>,
    no_publish: bool,
) -> Result<()> {
    let workspace = open_workspace(root)?;
    let result = run_backtest(&workspace, strategy, mode)?;
    print_summary(&result);

    let gate = RootWritePolicy::new(workspace.root());
    if let Some(path) = output_dataset_path {
        write_gated(&gate, &path, &export_dataset_csv(&result.dataset)?)?;
        println!("Dataset written to: {}", path.display());
    }
    if !no_publish {
        let sink = DirectorySink::new(workspace.runs_dir(mode), Box::new(gate));
        for path in sink.publish(&result)? {
            println!("Published: {}", path.display());
        }
    }
    Ok(())
}

fn run_compare_cmd(
    root: &Path,
    strategies: &[String],
    mode: SystemMode,
    output: Option<PathBuf>,
) -> Result<()> {
    let workspace = open_workspace(root)?;
    let (_, comparison) = compare(&workspace, strategies, mode)?;

    println!(
        "{:<28} {:>10} {:>10} {:>10} {:>10} {:>14}",
        "Strategy", "CAGR", "Vol", "Sharpe", "MaxDD", "Mean 5Y CAGR"
    );
    for s in &comparison.strategies {
        println!(
            "{:<28} {:>9.2}% {:>9.2}% {:>10.2} {:>9.2}% {:>14}",
            s.strategy_name,
            s.cagr * 100.0,
            s.volatility * 100.0,
            s.sharpe,
            s.max_drawdown * 100.0,
            pct_or_dash(s.mean_rolling_5y_cagr),
        );
    }
    println!();
    for p in &comparison.pairs {
        println!(
            "{} beats {} on rolling 5Y CAGR: {} of {} periods",
            p.a,
            p.b,
            pct_or_dash(p.share_a_beats_b),
            p.periods
        );
    }

    if let Some(path) = output {
        let gate = RootWritePolicy::new(workspace.root());
        write_gated(&gate, &path, &export_comparison_json(&comparison)?)?;
        println!("Comparison written to: {}", path.display());
    }
    Ok(())
}

fn run_allocate_cmd(root: &Path, portfolio_name: &str, mode: SystemMode) -> Result<()> {
    let workspace = open_workspace(root)?;
    let gate = RootWritePolicy::new(workspace.root());
    let (path, rows) = run_portfolio_targets(&workspace, portfolio_name, mode, &gate)?;
    for r in &rows {
        println!(
            "{:<16} {:<10} {:<8} {:>8.4}%  ({})",
            r.node_id,
            r.instrument_id,
            r.instrument_type,
            r.target_weight * 100.0,
            r.allocation_mode
        );
    }
    println!("Targets written to: {}", path.display());
    Ok(())
}

fn run_waterfall_cmd(root: &Path, hierarchy: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let workspace = open_workspace(root)?;
    let path = hierarchy.unwrap_or_else(|| workspace.instrument_hierarchy_path());
    let targets = run_instrument_waterfall(&path)?;
    let csv = export_instrument_targets_csv(&targets)?;
    match output {
        Some(out) => {
            let gate = RootWritePolicy::new(workspace.root());
            write_gated(&gate, &out, &csv)?;
            println!("Targets written to: {}", out.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_config_normalize(path: &Path) -> Result<()> {
    let raw = load_raw_config(path)?;
    let version = SchemaVersion::detect(&raw);
    let canonical = normalize_config(&raw);
    eprintln!("{}: schema {}", path.display(), version.as_str());
    println!("{}", serde_json::to_string_pretty(&canonical)?);
    Ok(())
}

fn run_config_check(path: &Path) -> Result<()> {
    let raw = load_raw_config(path)?;
    let config = parse_engine_config(&normalize_config(&raw))
        .with_context(|| format!("invalid config {}", path.display()))?;
    let pipeline = build_pipeline(&config)?;

    println!("Schema:      {}", SchemaVersion::detect(&raw).as_str());
    println!("Engine:      {} {}", config.engine.name, config.engine.version);
    println!("Pipeline:    {}", pipeline.describe().join(" -> "));
    println!("Leverage:    {}", config.constraints.leverage);
    println!("Fingerprint: {}", config.fingerprint());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!("=== Backtest: {} ({}) ===", result.strategy_name, result.mode);
    println!(
        "Period:         {} to {} ({} months)",
        result.start_date,
        result.end_date,
        result.dataset.len()
    );
    println!(
        "Prices:         raw {}..{} ({} rows), effective {}..{} ({} rows)",
        result.price_stats.raw_start,
        result.price_stats.raw_end,
        result.price_stats.raw_rows,
        result.price_stats.effective_start,
        result.price_stats.effective_end,
        result.price_stats.effective_rows
    );
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Volatility:     {:.2}%", m.volatility * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!(
        "Best / Worst:   {:.2}% / {:.2}%",
        m.best_month * 100.0,
        m.worst_month * 100.0
    );
    println!("Positive:       {:.1}%", m.pct_positive_months * 100.0);
    println!("Turnover:       {:.2}x/yr", m.annualized_turnover);
    if result.total_costs > 0.0 {
        println!("Costs:          ${:.2}", result.total_costs);
    }
    for (year, r) in &m.annual_returns {
        println!("  {year}: {:>7.2}%", r * 100.0);
    }
    println!("Dataset Hash:   {}", result.dataset_hash);
    println!("Config:         {}", result.config_fingerprint);
}

fn pct_or_dash(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}
