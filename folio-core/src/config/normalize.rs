//! Schema versioning and migration of raw engine configurations.
//!
//! Two shapes exist on disk:
//! - **v0** (legacy): `strategy.{name, weights}`, `overlays.{risk, regime}`,
//!   `rebalancer.type`, `constraints`.
//! - **v1** (canonical): `allocation_model`, `overlays: [..]`, `rebalancer`,
//!   `allocator`, `constraints`.
//!
//! `normalize_config` maps either onto v1. It is purely structural: no value is
//! computed, so a v0 file and its migrated v1 form drive the engine to
//! byte-identical results.

use serde_json::{json, Map, Value};

/// Allocation model used when a v0 file names no strategy.
pub const DEFAULT_ALLOCATION_MODEL: &str = "beta_engine_60_40";
/// Risk overlay used when a v0 file names none.
pub const DEFAULT_RISK_OVERLAY: &str = "risk_overlay_none";
/// Regime overlay used when a v0 file names none.
pub const DEFAULT_REGIME_OVERLAY: &str = "regime_overlay_none";
/// Rebalancer used when a v0 file names none.
pub const DEFAULT_REBALANCER: &str = "monthly";
/// The only allocator a v0 file can express.
pub const LEGACY_ALLOCATOR: &str = "capital_allocator";

/// Version of a raw configuration mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V0,
    V1,
}

impl SchemaVersion {
    /// A mapping is v1 exactly when it carries an `allocation_model` key.
    ///
    /// Non-mapping values are reported as v1 so they pass through untouched
    /// and the parser rejects them with a type error.
    pub fn detect(raw: &Value) -> Self {
        match raw {
            Value::Object(map) if !map.contains_key("allocation_model") => SchemaVersion::V0,
            _ => SchemaVersion::V1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V0 => "v0",
            SchemaVersion::V1 => "v1",
        }
    }
}

/// Normalize any raw configuration into the v1 shape.
///
/// Total and idempotent: `normalize_config(&normalize_config(x)) == normalize_config(x)`.
pub fn normalize_config(raw: &Value) -> Value {
    match SchemaVersion::detect(raw) {
        SchemaVersion::V1 => raw.clone(),
        SchemaVersion::V0 => migrate_v0_to_v1(raw),
    }
}

/// Rewrite a v0 mapping as v1.
///
/// Legacy sections that are not mappings are read as empty, so their
/// defaults apply. Leaf values are copied as found; a wrongly typed leaf (for
/// example a numeric strategy name) is left for the parser to reject.
pub fn migrate_v0_to_v1(raw: &Value) -> Value {
    let empty = Map::new();
    let root = raw.as_object().unwrap_or(&empty);

    let engine = root
        .get("engine")
        .cloned()
        .unwrap_or_else(|| json!({ "name": "portfolio_engine", "version": "0.1" }));

    let model_type = field(root, "strategy", "name")
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_ALLOCATION_MODEL));
    let weights = field(root, "strategy", "weights")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    let risk = field(root, "overlays", "risk")
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_RISK_OVERLAY));
    let regime = field(root, "overlays", "regime")
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_REGIME_OVERLAY));

    let rebalancer_type = field(root, "rebalancer", "type")
        .cloned()
        .unwrap_or_else(|| Value::from(DEFAULT_REBALANCER));

    let constraints = root
        .get("constraints")
        .cloned()
        .unwrap_or_else(|| json!({ "leverage": false }));

    json!({
        "engine": engine,
        "allocation_model": {
            "type": model_type,
            "params": { "weights": weights },
        },
        "overlays": [
            { "type": risk, "params": {} },
            { "type": regime, "params": {} },
        ],
        "rebalancer": { "type": rebalancer_type, "params": {} },
        "allocator": { "type": LEGACY_ALLOCATOR, "params": {} },
        "constraints": constraints,
    })
}

/// `root[section][key]`, treating a non-mapping section as absent.
fn field<'a>(root: &'a Map<String, Value>, section: &str, key: &str) -> Option<&'a Value> {
    root.get(section)?.as_object()?.get(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> Value {
        json!({
            "engine": { "name": "portfolio_engine", "version": "0.0" },
            "strategy": { "name": "beta_engine_60_40", "weights": { "SPY": 0.6, "TLT": 0.4 } },
            "overlays": { "risk": "risk_overlay_none", "regime": "regime_overlay_none" },
            "rebalancer": { "type": "monthly" },
            "constraints": { "leverage": false },
        })
    }

    #[test]
    fn detects_versions() {
        assert_eq!(SchemaVersion::detect(&legacy()), SchemaVersion::V0);
        assert_eq!(
            SchemaVersion::detect(&normalize_config(&legacy())),
            SchemaVersion::V1
        );
        assert_eq!(SchemaVersion::detect(&json!([1, 2])), SchemaVersion::V1);
    }

    #[test]
    fn migrates_legacy_fields() {
        let out = migrate_v0_to_v1(&legacy());
        assert_eq!(out["allocation_model"]["type"], "beta_engine_60_40");
        assert_eq!(out["allocation_model"]["params"]["weights"]["SPY"], 0.6);
        assert_eq!(out["overlays"][0]["type"], "risk_overlay_none");
        assert_eq!(out["overlays"][1]["type"], "regime_overlay_none");
        assert_eq!(out["rebalancer"]["type"], "monthly");
        assert_eq!(out["allocator"]["type"], "capital_allocator");
        assert_eq!(out["constraints"]["leverage"], false);
        assert_eq!(out["engine"]["version"], "0.0");
    }

    #[test]
    fn empty_legacy_gets_defaults() {
        let out = normalize_config(&json!({}));
        assert_eq!(out["engine"]["name"], "portfolio_engine");
        assert_eq!(out["engine"]["version"], "0.1");
        assert_eq!(out["allocation_model"]["type"], DEFAULT_ALLOCATION_MODEL);
        assert_eq!(out["allocation_model"]["params"]["weights"], json!({}));
        assert_eq!(out["overlays"].as_array().map(Vec::len), Some(2));
        assert_eq!(out["rebalancer"]["type"], DEFAULT_REBALANCER);
        assert_eq!(out["constraints"], json!({ "leverage": false }));
    }

    #[test]
    fn canonical_passes_through_unchanged() {
        let canonical = json!({
            "engine": { "name": "e", "version": "1" },
            "allocation_model": { "type": "beta_engine_60_40", "params": {} },
            "overlays": [],
            "rebalancer": { "type": "monthly" },
            "allocator": { "type": "capital_allocator" },
            "extra": 7,
        });
        assert_eq!(normalize_config(&canonical), canonical);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_config(&legacy());
        let twice = normalize_config(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn non_mapping_sections_read_as_empty() {
        let out = normalize_config(&json!({ "strategy": "oops", "overlays": [1] }));
        assert_eq!(out["allocation_model"]["type"], DEFAULT_ALLOCATION_MODEL);
        assert_eq!(out["overlays"][0]["type"], DEFAULT_RISK_OVERLAY);
    }

    #[test]
    fn wrongly_typed_leaf_is_carried_over() {
        let out = normalize_config(&json!({ "strategy": { "name": 5 } }));
        assert_eq!(out["allocation_model"]["type"], 5);
    }
}
