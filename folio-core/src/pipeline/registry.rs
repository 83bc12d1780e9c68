//! Pipeline registry — converts `ModuleConfig`s into runtime trait objects.
//!
//! Each role has a closed set of registered types, modelled as an enum. A type
//! name resolves to a variant or fails with "Unknown module type"; the factory
//! then matches exhaustively, so adding a variant without a constructor does
//! not compile.

use serde_json::{Map, Value};

use super::allocation::{AllocationModel, StaticWeights};
use super::allocator::{Allocator, CapitalAllocator};
use super::overlay::{NoOpOverlay, Overlay};
use super::rebalancer::{MonthlyRebalancer, Rebalancer};
use crate::config::{EngineConfig, ModuleConfig};
use crate::domain::Weights;

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur while building a pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown module type for {role}: {name}")]
    UnknownModuleType { role: &'static str, name: String },
    #[error("Invalid param {param} for {module}: {reason}")]
    InvalidParam {
        module: String,
        param: String,
        reason: String,
    },
    #[error("Unexpected param {param} for {module}")]
    UnexpectedParam { module: String, param: String },
}

// ─── Registered types ────────────────────────────────────────────────

macro_rules! registry_kind {
    (
        $(#[$meta:meta])*
        $kind:ident, $role:literal { $($variant:ident => $name:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $kind {
            $($variant),+
        }

        impl $kind {
            /// Every registered variant, in registry order.
            pub const ALL: &'static [$kind] = &[$($kind::$variant),+];
            pub const ROLE: &'static str = $role;

            pub fn from_name(name: &str) -> Result<Self, FactoryError> {
                match name {
                    $($name => Ok($kind::$variant),)+
                    other => Err(FactoryError::UnknownModuleType {
                        role: Self::ROLE,
                        name: other.to_string(),
                    }),
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($kind::$variant => $name),+
                }
            }
        }
    };
}

registry_kind! {
    /// Registered allocation models.
    AllocationModelKind, "allocation_model" {
        BetaEngine6040 => "beta_engine_60_40",
    }
}

registry_kind! {
    /// Registered overlays.
    OverlayKind, "overlay" {
        RiskOverlayNone => "risk_overlay_none",
        RegimeOverlayNone => "regime_overlay_none",
    }
}

registry_kind! {
    /// Registered rebalancers.
    RebalancerKind, "rebalancer" {
        Monthly => "monthly",
    }
}

registry_kind! {
    /// Registered allocators.
    AllocatorKind, "allocator" {
        CapitalAllocator => "capital_allocator",
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Fail if `params` carries any key outside `allowed`.
fn reject_unexpected(config: &ModuleConfig, allowed: &[&str]) -> Result<(), FactoryError> {
    match config.params.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(FactoryError::UnexpectedParam {
            module: config.module_type.clone(),
            param: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Decode a `{symbol: number}` param. Absent means empty.
fn param_weights(config: &ModuleConfig, name: &str) -> Result<Weights, FactoryError> {
    let invalid = |reason: String| FactoryError::InvalidParam {
        module: config.module_type.clone(),
        param: name.to_string(),
        reason,
    };
    let raw: &Map<String, Value> = match config.params.get(name) {
        None | Some(Value::Null) => return Ok(Weights::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(invalid("expected a mapping of symbol to number".into())),
    };
    raw.iter()
        .map(|(symbol, value)| {
            value
                .as_f64()
                .map(|w| (symbol.clone(), w))
                .ok_or_else(|| invalid(format!("weight for {symbol} is not a number")))
        })
        .collect()
}

// ─── Factories ───────────────────────────────────────────────────────

/// Create an allocation model from a `ModuleConfig`.
pub fn create_allocation_model(
    config: &ModuleConfig,
) -> Result<Box<dyn AllocationModel>, FactoryError> {
    match AllocationModelKind::from_name(&config.module_type)? {
        AllocationModelKind::BetaEngine6040 => {
            reject_unexpected(config, &["weights"])?;
            let weights = param_weights(config, "weights")?;
            Ok(Box::new(StaticWeights::new(
                AllocationModelKind::BetaEngine6040.as_str(),
                weights,
            )))
        }
    }
}

/// Create an overlay from a `ModuleConfig`.
pub fn create_overlay(config: &ModuleConfig) -> Result<Box<dyn Overlay>, FactoryError> {
    let kind = OverlayKind::from_name(&config.module_type)?;
    reject_unexpected(config, &[])?;
    match kind {
        OverlayKind::RiskOverlayNone | OverlayKind::RegimeOverlayNone => {
            Ok(Box::new(NoOpOverlay::new(kind.as_str())))
        }
    }
}

/// Create a rebalancer from a `ModuleConfig`.
pub fn create_rebalancer(config: &ModuleConfig) -> Result<Box<dyn Rebalancer>, FactoryError> {
    match RebalancerKind::from_name(&config.module_type)? {
        RebalancerKind::Monthly => {
            reject_unexpected(config, &[])?;
            Ok(Box::new(MonthlyRebalancer))
        }
    }
}

/// Create an allocator from a `ModuleConfig`.
pub fn create_allocator(config: &ModuleConfig) -> Result<Box<dyn Allocator>, FactoryError> {
    match AllocatorKind::from_name(&config.module_type)? {
        AllocatorKind::CapitalAllocator => {
            reject_unexpected(config, &[])?;
            Ok(Box::new(CapitalAllocator))
        }
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// One assembled pipeline. Immutable after construction.
pub struct Pipeline {
    pub allocation_model: Box<dyn AllocationModel>,
    pub overlays: Vec<Box<dyn Overlay>>,
    pub rebalancer: Box<dyn Rebalancer>,
    pub allocator: Box<dyn Allocator>,
}

impl Pipeline {
    /// Stage names in execution order, for logging.
    pub fn describe(&self) -> Vec<&str> {
        let mut names = vec![self.allocation_model.name()];
        names.extend(self.overlays.iter().map(|o| o.name()));
        names.push(self.rebalancer.name());
        names.push(self.allocator.name());
        names
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}

/// Build every stage named by `config`.
pub fn build_pipeline(config: &EngineConfig) -> Result<Pipeline, FactoryError> {
    let pipeline = Pipeline {
        allocation_model: create_allocation_model(&config.allocation_model)?,
        overlays: config
            .overlays
            .iter()
            .map(create_overlay)
            .collect::<Result<Vec<_>, _>>()?,
        rebalancer: create_rebalancer(&config.rebalancer)?,
        allocator: create_allocator(&config.allocator)?,
    };
    tracing::debug!(stages = ?pipeline.describe(), "built pipeline");
    Ok(pipeline)
}
