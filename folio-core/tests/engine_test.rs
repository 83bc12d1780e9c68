//! Integration tests for the portfolio engine on the 60/40 reference config.
//!
//! Tests:
//! 1. Percent weights normalize to fractions
//! 2. Same-month run computes weights but no trades
//! 3. New-month run rebalances to target units
//! 4. Overlay order and empty overlay lists
//! 5. Config errors surface at construction

use chrono::NaiveDate;
use folio_core::config::{parse_engine_config, EngineConfig};
use folio_core::domain::{Positions, Prices};
use folio_core::engine::{EngineError, PortfolioEngine};
use folio_core::pipeline::FactoryError;
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────

const TOL: f64 = 1e-12;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn map(pairs: &[(&str, f64)]) -> std::collections::BTreeMap<String, f64> {
    pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
}

fn canonical_60_40() -> serde_json::Value {
    json!({
        "engine": { "name": "portfolio_engine", "version": "0.1" },
        "allocation_model": {
            "type": "beta_engine_60_40",
            "params": { "weights": { "SPY": 60, "TLT": 40 } }
        },
        "overlays": [
            { "type": "risk_overlay_none", "params": {} },
            { "type": "regime_overlay_none", "params": {} }
        ],
        "rebalancer": { "type": "monthly", "params": {} },
        "allocator": { "type": "capital_allocator", "params": {} },
        "constraints": { "leverage": false }
    })
}

fn engine() -> PortfolioEngine {
    PortfolioEngine::from_raw(&canonical_60_40()).unwrap()
}

fn prices() -> Prices {
    map(&[("SPY", 100.0), ("TLT", 100.0)])
}

// ── Reference examples ───────────────────────────────────────────────

#[test]
fn percent_weights_normalize() {
    let out = engine()
        .run(d(2026, 1, 2), &prices(), 1000.0, &Positions::new(), None)
        .unwrap();
    assert!((out.weights["SPY"] - 0.6).abs() < TOL);
    assert!((out.weights["TLT"] - 0.4).abs() < TOL);
    assert!(out.should_rebalance);
}

#[test]
fn run_returns_normalized_weights() {
    let out = engine()
        .run(
            d(2026, 2, 2),
            &prices(),
            1000.0,
            &map(&[("SPY", 6.0), ("TLT", 4.0)]),
            Some(d(2026, 1, 2)),
        )
        .unwrap();
    assert_eq!(out.as_of_date, d(2026, 2, 2));
    assert!((out.weights["SPY"] - 0.6).abs() < TOL);
    assert!((out.weights["TLT"] - 0.4).abs() < TOL);
    assert!((out.allocations["SPY"].target_notional - 600.0).abs() < TOL);
    assert!((out.allocations["TLT"].target_units - 4.0).abs() < TOL);
}

#[test]
fn same_month_has_no_rebalance_or_trades() {
    let out = engine()
        .run(
            d(2026, 2, 15),
            &prices(),
            1000.0,
            &map(&[("SPY", 6.0), ("TLT", 4.0)]),
            Some(d(2026, 2, 2)),
        )
        .unwrap();
    assert!(!out.should_rebalance);
    assert!(out.trades.is_empty());
}

#[test]
fn new_month_rebalances_to_targets() {
    let out = engine()
        .run(
            d(2026, 3, 2),
            &prices(),
            1000.0,
            &map(&[("SPY", 5.0), ("TLT", 5.0)]),
            Some(d(2026, 2, 2)),
        )
        .unwrap();
    assert!(out.should_rebalance);
    assert_eq!(out.trades.len(), 2);
    assert!((out.trades["SPY"] - 1.0).abs() < TOL);
    assert!((out.trades["TLT"] + 1.0).abs() < TOL);
}

#[test]
fn trades_liquidate_symbols_outside_target() {
    let out = engine()
        .run(
            d(2026, 3, 2),
            &prices(),
            1000.0,
            &map(&[("GLD", 3.0)]),
            None,
        )
        .unwrap();
    assert!((out.trades["GLD"] + 3.0).abs() < TOL);
    assert!((out.trades["SPY"] - 6.0).abs() < TOL);
}

// ── Config shape ─────────────────────────────────────────────────────

#[test]
fn empty_overlay_list_matches_no_op_overlays() {
    let mut raw = canonical_60_40();
    raw["overlays"] = json!([]);
    let bare = PortfolioEngine::from_raw(&raw).unwrap();
    let a = bare
        .run(d(2026, 1, 2), &prices(), 500.0, &Positions::new(), None)
        .unwrap();
    let b = engine()
        .run(d(2026, 1, 2), &prices(), 500.0, &Positions::new(), None)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn unknown_overlay_fails_construction() {
    let mut raw = canonical_60_40();
    raw["overlays"][1]["type"] = json!("vol_target");
    match PortfolioEngine::from_raw(&raw).unwrap_err() {
        EngineError::Factory(FactoryError::UnknownModuleType { role, name }) => {
            assert_eq!(role, "overlay");
            assert_eq!(name, "vol_target");
        }
        other => panic!("expected UnknownModuleType, got {:?}", other),
    }
}

#[test]
fn invalid_field_is_config_error() {
    let mut raw = canonical_60_40();
    raw["constraints"]["leverage"] = json!(1);
    assert!(matches!(
        PortfolioEngine::from_raw(&raw).unwrap_err(),
        EngineError::Config(_)
    ));
}

#[test]
fn injected_weights_replace_model_weights() {
    let cfg: EngineConfig = parse_engine_config(&canonical_60_40()).unwrap();
    let next = cfg.with_allocation_weights(&map(&[("SPY", 1.0)]));
    let engine = PortfolioEngine::new(next).unwrap();
    let out = engine
        .run(d(2026, 1, 2), &prices(), 1000.0, &Positions::new(), None)
        .unwrap();
    assert_eq!(out.weights.len(), 1);
    assert!((out.weights["SPY"] - 1.0).abs() < TOL);
}

#[test]
fn leverage_constraint_is_carried() {
    let mut raw = canonical_60_40();
    raw["constraints"]["leverage"] = json!(true);
    let engine = PortfolioEngine::from_raw(&raw).unwrap();
    assert!(engine.config().constraints.leverage);
}
