//! Typed engine configuration and its parser.
//!
//! `parse_engine_config` validates a canonical (v1) mapping into an immutable
//! `EngineConfig`. Absent optional fields get defaults; present but invalid
//! fields are always errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::Weights;

/// Errors raised while loading or parsing an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a mapping")]
    NotAMapping { field: String },
    #[error("{field} must be a list")]
    NotAList { field: String },
    #[error("{field} must be a non-empty string")]
    EmptyString { field: String },
    #[error("{field} must be a boolean")]
    NotABoolean { field: String },
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("unsupported config extension for {0} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat(String),
}

/// Name and version of the engine a configuration targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub name: String,
    pub version: String,
}

/// One typed pipeline module: a registry type name plus its parameters.
///
/// `params` keeps the raw JSON values; the factory decodes them per module.
/// `serde_json::Map` is ordered by key, which keeps serialization deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(rename = "type")]
    pub module_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ModuleConfig {
    pub fn new(module_type: impl Into<String>) -> Self {
        Self {
            module_type: module_type.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// Portfolio-level constraints visible to every pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub leverage: bool,
}

/// Validated, immutable description of one allocation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub engine: EngineMeta,
    pub allocation_model: ModuleConfig,
    pub overlays: Vec<ModuleConfig>,
    pub rebalancer: ModuleConfig,
    pub allocator: ModuleConfig,
    pub constraints: Constraints,
}

impl EngineConfig {
    /// BLAKE3 hash of the canonical JSON serialization.
    ///
    /// Two configurations that drive identical pipelines hash identically,
    /// whichever schema version they were loaded from.
    pub fn fingerprint(&self) -> String {
        // Serializing plain structs, strings, bools and JSON values cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Canonical mapping form; parses back to an equal `EngineConfig`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// A copy of this config whose allocation model uses `weights`.
    ///
    /// Every other field, including any other model params, is kept.
    pub fn with_allocation_weights(&self, weights: &Weights) -> Self {
        let mut next = self.clone();
        let weights: Map<String, Value> = weights
            .iter()
            .map(|(symbol, w)| (symbol.clone(), Value::from(*w)))
            .collect();
        next.allocation_model
            .params
            .insert("weights".into(), Value::Object(weights));
        next
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parse a canonical (v1) configuration mapping.
///
/// Unknown top-level keys are ignored so mode files may carry extra sections.
pub fn parse_engine_config(config: &Value) -> Result<EngineConfig, ConfigError> {
    let root = require_mapping(Some(config), "config")?;

    let engine_raw = require_mapping(root.get("engine"), "engine")?;
    let name = match engine_raw.get("name") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(empty_string("engine.name")),
    };
    let version = match engine_raw.get("version") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(empty_string("engine.version")),
    };

    let allocation_model = parse_module(root.get("allocation_model"), "allocation_model")?;

    let overlays = match root.get("overlays") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| parse_module(Some(item), &format!("overlays[{idx}]")))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(ConfigError::NotAList {
                field: "overlays".into(),
            })
        }
    };

    let rebalancer = parse_module(root.get("rebalancer"), "rebalancer")?;
    let allocator = parse_module(root.get("allocator"), "allocator")?;

    let constraints = match root.get("constraints") {
        None => Constraints::default(),
        other => {
            let raw = require_mapping(other, "constraints")?;
            let leverage = match raw.get("leverage") {
                None => false,
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(ConfigError::NotABoolean {
                        field: "constraints.leverage".into(),
                    })
                }
            };
            Constraints { leverage }
        }
    };

    Ok(EngineConfig {
        engine: EngineMeta { name, version },
        allocation_model,
        overlays,
        rebalancer,
        allocator,
        constraints,
    })
}

fn parse_module(value: Option<&Value>, field: &str) -> Result<ModuleConfig, ConfigError> {
    let raw = require_mapping(value, field)?;
    let module_type = match raw.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(empty_string(&format!("{field}.type"))),
    };
    let params = match raw.get("params") {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(ConfigError::NotAMapping {
                field: format!("{field}.params"),
            })
        }
    };
    Ok(ModuleConfig {
        module_type,
        params,
    })
}

fn require_mapping<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(ConfigError::NotAMapping {
            field: field.to_string(),
        }),
    }
}

fn empty_string(field: &str) -> ConfigError {
    ConfigError::EmptyString {
        field: field.to_string(),
    }
}
