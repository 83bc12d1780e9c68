//! Folio Core — allocation pipeline, portfolio engine, hierarchy waterfall.
//!
//! This crate contains the allocation core:
//! - Domain types (weights, positions, prices, allocations, trades)
//! - Versioned engine configuration with a pure v0 → v1 migration
//! - Registry of pipeline stages (allocation model, overlays, rebalancer, allocator)
//! - Portfolio engine: one pipeline pass per market snapshot
//! - Four-level hierarchy waterfall from taxonomy and definitions to instruments

pub mod config;
pub mod domain;
pub mod engine;
pub mod hierarchy;
pub mod pipeline;

pub use config::{EngineConfig, SchemaVersion};
pub use engine::{EngineError, EngineOutput, PortfolioEngine};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: public types are Send + Sync so independent
    /// backtests can run on worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Allocation>();
        require_sync::<domain::Allocation>();

        // Config types
        require_send::<config::EngineConfig>();
        require_sync::<config::EngineConfig>();
        require_send::<config::ModuleConfig>();
        require_sync::<config::ModuleConfig>();
        require_send::<config::ConfigError>();
        require_sync::<config::ConfigError>();

        // Pipeline types
        require_send::<pipeline::Pipeline>();
        require_sync::<pipeline::Pipeline>();
        require_send::<pipeline::PipelineContext>();
        require_sync::<pipeline::PipelineContext>();
        require_send::<pipeline::StaticWeights>();
        require_sync::<pipeline::StaticWeights>();
        require_send::<pipeline::NoOpOverlay>();
        require_sync::<pipeline::NoOpOverlay>();
        require_send::<pipeline::MonthlyRebalancer>();
        require_sync::<pipeline::MonthlyRebalancer>();
        require_send::<pipeline::CapitalAllocator>();
        require_sync::<pipeline::CapitalAllocator>();

        // Engine types
        require_send::<engine::PortfolioEngine>();
        require_sync::<engine::PortfolioEngine>();
        require_send::<engine::EngineOutput>();
        require_sync::<engine::EngineOutput>();
        require_send::<engine::EngineError>();
        require_sync::<engine::EngineError>();

        // Hierarchy types
        require_send::<hierarchy::Hierarchy>();
        require_sync::<hierarchy::Hierarchy>();
        require_send::<hierarchy::TargetRow>();
        require_sync::<hierarchy::TargetRow>();
    }

    /// Stages receive the portfolio only through `PipelineContext`.
    #[test]
    fn stages_see_only_the_context() {
        fn _check(
            model: &dyn pipeline::AllocationModel,
            date: chrono::NaiveDate,
            ctx: &pipeline::PipelineContext,
        ) -> Result<domain::Weights, pipeline::PipelineError> {
            model.target_weights(date, ctx)
        }
    }
}
