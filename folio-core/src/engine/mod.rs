//! Portfolio engine — one allocation pass over a market snapshot.
//!
//! `run()` is a pure function of its arguments and the immutable config:
//! 1. allocation model → raw target weights
//! 2. overlays, in list order
//! 3. rebalance decision
//! 4. allocator → target notional and units (always computed)
//! 5. trades, only when a rebalance is due
//!
//! A fresh pipeline is assembled on every call; no stage carries state
//! between calls.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{
    load_engine_config, normalize_config, parse_engine_config, ConfigError, EngineConfig,
};
use crate::domain::{target_positions, Allocations, Positions, Prices, Trades, Weights};
use crate::pipeline::{build_pipeline, FactoryError, PipelineContext, PipelineError};

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result of one `run()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub as_of_date: NaiveDate,
    pub weights: Weights,
    pub allocations: Allocations,
    pub should_rebalance: bool,
    pub trades: Trades,
}

/// Drives one configured pipeline.
#[derive(Debug, Clone)]
pub struct PortfolioEngine {
    config: EngineConfig,
}

impl PortfolioEngine {
    /// Wrap a parsed config. Builds the pipeline once so a bad module name or
    /// param fails here rather than on the first `run()`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        build_pipeline(&config)?;
        Ok(Self { config })
    }

    /// Normalize and parse a raw (v0 or v1) mapping.
    pub fn from_raw(raw: &Value) -> Result<Self, EngineError> {
        let config = parse_engine_config(&normalize_config(raw))?;
        Self::new(config)
    }

    /// Load a YAML/TOML/JSON config file.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        Self::new(load_engine_config(path)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(&self) -> PipelineContext {
        PipelineContext {
            constraints: self.config.constraints,
        }
    }

    pub fn run(
        &self,
        as_of: NaiveDate,
        prices: &Prices,
        portfolio_value: f64,
        current_positions: &Positions,
        last_rebalance: Option<NaiveDate>,
    ) -> Result<EngineOutput, EngineError> {
        let pipeline = build_pipeline(&self.config)?;
        let ctx = self.context();

        let mut weights = pipeline.allocation_model.target_weights(as_of, &ctx)?;
        for overlay in &pipeline.overlays {
            weights = overlay.apply(&weights, as_of, &ctx)?;
        }

        let should_rebalance = pipeline
            .rebalancer
            .should_rebalance(as_of, last_rebalance, &ctx);

        let allocations = pipeline
            .allocator
            .allocate(&weights, portfolio_value, prices, &ctx)?;

        let trades = if should_rebalance {
            let targets = target_positions(&allocations);
            pipeline
                .rebalancer
                .generate_trades(current_positions, &targets, &ctx)
        } else {
            Trades::new()
        };

        tracing::debug!(
            %as_of,
            portfolio_value,
            should_rebalance,
            trades = trades.len(),
            "engine run"
        );

        Ok(EngineOutput {
            as_of_date: as_of,
            weights,
            allocations,
            should_rebalance,
            trades,
        })
    }
}
