use std::fs;
use std::path::Path;

use chrono::{Datelike, Months, NaiveDate};
use folio_runner::export::{import_json, load_result};
use folio_runner::sink::{DirectorySink, ReportSink, RootWritePolicy};
use folio_runner::{compare, run_backtest, run_portfolio_targets, RunError, SystemMode, Workspace};

const CONFIG: &str = "\
engine:
  name: portfolio_engine
  version: '0.1'
strategy:
  name: beta_engine_60_40
  weights:
    SPY: 60
    TLT: 40
overlays:
  risk: risk_overlay_none
  regime: regime_overlay_none
rebalancer:
  type: monthly
constraints:
  leverage: false
";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Two observations per month for `months` months. GLD only starts in the
/// third month.
fn price_csv(months: u32) -> String {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut out = String::from("date,SPY,TLT,GLD\n");
    for m in 0..months {
        let first = start.checked_add_months(Months::new(m)).unwrap();
        let mid = first.with_day(15).unwrap();
        let spy = 100.0 * 1.008f64.powi(m as i32);
        let tlt = 80.0 + (m % 5) as f64;
        let gld = if m < 2 { String::new() } else { format!("{}", 120.0 + m as f64 * 0.5) };
        out.push_str(&format!("{first},{},{tlt},{gld}\n", spy * 0.99));
        out.push_str(&format!("{mid},{spy},{tlt},{gld}\n"));
    }
    out
}

fn workspace(months: u32) -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "systems/capital/config.yaml", CONFIG);
    write(root, "data/market/prices.csv", &price_csv(months));
    write(
        root,
        "inputs/portfolios/portfolio_templates.csv",
        "mode,portfolio_id,name,rebalance\n\
         capital,core-60-40,Core_60_40,monthly\n\
         capital,all-weather,All_Weather,monthly\n",
    );
    write(
        root,
        "inputs/portfolios/portfolio_weights.csv",
        "mode,portfolio_id,ticker,weight\n\
         capital,core-60-40,SPY,0.6\n\
         capital,core-60-40,TLT,0.4\n\
         capital,all-weather,SPY,0.3\n\
         capital,all-weather,TLT,0.4\n\
         capital,all-weather,GLD,0.3\n",
    );
    write(
        root,
        "inputs/asset_class_hierarchy.csv",
        "level1,level2,level3,level4,node_id\n\
         Equity,US,Large,Core,EQ_US\n\
         Fixed Income,Govt,Long,Core,FI_LONG\n",
    );
    write(
        root,
        "inputs/portfolio_definitions.csv",
        "portfolio_name,node_id,weight,weight_type\n\
         balanced,EQ_US,0.6,static\n\
         balanced,FI_LONG,0.4,static\n",
    );
    write(
        root,
        "inputs/instrument_mapping.csv",
        "node_id,instrument_id,instrument_type,data_source\n\
         EQ_US,SPY,ETF,yahoo\n\
         EQ_US,VTI,ETF,yahoo\n\
         FI_LONG,TLT,ETF,yahoo\n",
    );
    let ws = Workspace::open(root).unwrap();
    (dir, ws)
}

#[test]
fn backtest_end_to_end() {
    let (_dir, ws) = workspace(24);
    let result = run_backtest(&ws, "core_60_40", SystemMode::Capital).unwrap();

    assert_eq!(result.strategy_name, "Core_60_40");
    assert_eq!(result.dataset.len(), 24);
    assert_eq!(result.price_stats.raw_rows, 48);
    // GLD is not required by this portfolio, so its gaps do not matter.
    assert_eq!(result.price_stats.effective_rows, 48);
    assert_eq!(result.start_date.to_string(), "2015-01-15");
    assert!((result.dataset[0].portfolio_value - 10_000.0).abs() < 1e-6);
    assert_eq!(result.dataset[0].monthly_return, 0.0);
    assert!(result.total_turnover > 0.99);
    assert!(result.metrics.total_return > 0.0);
}

#[test]
fn pre_inception_gaps_shrink_the_window() {
    let (_dir, ws) = workspace(24);
    let result = run_backtest(&ws, "all-weather", SystemMode::Capital).unwrap();
    assert_eq!(result.price_stats.effective_rows, 44);
    assert_eq!(result.dataset.len(), 22);
    assert_eq!(result.start_date.to_string(), "2015-03-15");
}

#[test]
fn sink_writes_json_and_csv() {
    let (dir, ws) = workspace(12);
    let result = run_backtest(&ws, "core-60-40", SystemMode::Capital).unwrap();
    let sink = DirectorySink::new(
        ws.runs_dir(SystemMode::Capital),
        Box::new(RootWritePolicy::new(dir.path())),
    );
    let paths = sink.publish(&result).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("core-60-40.json"));

    let loaded = load_result(&paths[0]).unwrap();
    assert_eq!(loaded.dataset.len(), result.dataset.len());
    assert_eq!(loaded.dataset[11].date, result.dataset[11].date);
    assert_eq!(loaded.portfolio, result.portfolio);
    assert_eq!(loaded.config_fingerprint, result.config_fingerprint);

    let csv = fs::read_to_string(&paths[1]).unwrap();
    assert_eq!(csv.lines().count(), 13);
    assert!(csv.lines().nth(1).unwrap().contains(",10000.0000000000,"));
}

#[test]
fn sink_refuses_workspace_root() {
    let (dir, ws) = workspace(12);
    let result = run_backtest(&ws, "core-60-40", SystemMode::Capital).unwrap();
    let sink = DirectorySink::new(dir.path(), Box::new(RootWritePolicy::new(dir.path())));
    assert!(sink.publish(&result).is_err());
    assert!(!dir.path().join("core-60-40.json").exists());
}

#[test]
fn newer_schema_is_rejected() {
    let (_dir, ws) = workspace(12);
    let mut result = run_backtest(&ws, "core-60-40", SystemMode::Capital).unwrap();
    result.schema_version = 2;
    let json = serde_json::to_string(&result).unwrap();
    let err = import_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version 2"));
}

#[test]
fn compare_runs_both_strategies() {
    let (_dir, ws) = workspace(72);
    let ids = vec!["core-60-40".to_string(), "all-weather".to_string()];
    let (results, cmp) = compare(&ws, &ids, SystemMode::Capital).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(cmp.strategies[0].strategy_name, "Core_60_40");
    assert_eq!(cmp.pairs.len(), 1);
    assert_eq!(cmp.pairs[0].a, "Core_60_40");
    assert!(cmp.pairs[0].periods > 0);
    assert!(cmp.strategies.iter().all(|s| s.mean_rolling_5y_cagr.is_some()));
}

#[test]
fn compare_needs_two() {
    let (_dir, ws) = workspace(12);
    let err = compare(&ws, &["core-60-40".to_string()], SystemMode::Capital).unwrap_err();
    assert!(matches!(err, RunError::NotEnoughStrategies(1)));
}

#[test]
fn missing_engine_config_fails() {
    let (_dir, ws) = workspace(12);
    let err = run_backtest(&ws, "core-60-40", SystemMode::Research).unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
}

#[test]
fn portfolio_targets_written_to_runtime_dir() {
    let (dir, ws) = workspace(12);
    let gate = RootWritePolicy::new(dir.path());
    let (path, rows) = run_portfolio_targets(&ws, "balanced", SystemMode::Capital, &gate).unwrap();
    assert_eq!(path, ws.runtime_dir(SystemMode::Capital).join("portfolio_targets.csv"));
    assert_eq!(rows.len(), 3);
    let spy = rows.iter().find(|r| r.instrument_id == "SPY").unwrap();
    assert!((spy.target_weight - 0.3).abs() < 1e-12);
    let total: f64 = rows.iter().map(|r| r.target_weight).sum();
    assert!((total - 1.0).abs() < 1e-12);

    let csv = fs::read_to_string(path).unwrap();
    assert!(csv.starts_with("portfolio_name,node_id,instrument_id,instrument_type,allocation_mode,target_weight"));
}

#[test]
fn unknown_portfolio_name_fails() {
    let (dir, ws) = workspace(12);
    let gate = RootWritePolicy::new(dir.path());
    let err = run_portfolio_targets(&ws, "aggressive", SystemMode::Capital, &gate).unwrap_err();
    assert!(err.to_string().contains("Portfolio definition not found: aggressive"));
}
