//! Folio Runner — backtests, reports and target runs over a workspace.
//!
//! This crate builds on `folio-core` to provide:
//! - Workspace settings (`folio.toml`) and system modes
//! - CSV loading for prices, portfolio templates and hierarchy tables
//! - The monthly simulation loop, metrics and canonical dataset
//! - Parallel multi-portfolio comparison
//! - JSON/CSV export behind a report sink and publish gate
//! - Definition-driven and equal-weight instrument target runs

pub mod allocate;
pub mod config;
pub mod dataset;
pub mod export;
pub mod metrics;
pub mod portfolio;
pub mod prices;
pub mod runner;
pub mod simulation;
pub mod sink;
pub mod tables;

pub use allocate::{run_instrument_waterfall, run_portfolio_targets};
pub use config::{RunnerSettings, SettingsError, SimulationSettings, SystemMode, Workspace};
pub use dataset::{build_canonical_dataset, CanonicalRow};
pub use metrics::MonthlyMetrics;
pub use portfolio::{load_portfolio, PortfolioSpec};
pub use prices::{load_prices, PriceStats, PriceTable};
pub use runner::{
    compare, compare_results, run_backtest, run_backtest_from_data, BacktestResult, Comparison,
    RunError,
};
pub use simulation::{simulate, PeriodRecord, SimulationError, SimulationOutput};
pub use sink::{DirectorySink, PublishGate, ReportSink, RootWritePolicy, SinkError};
pub use tables::LoadError;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<Comparison>();
        assert_sync::<Comparison>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }

    #[test]
    fn workspace_is_send_sync() {
        assert_send::<Workspace>();
        assert_sync::<Workspace>();
        assert_send::<PriceTable>();
        assert_sync::<PriceTable>();
    }

    #[test]
    fn sinks_are_send_sync() {
        assert_send::<DirectorySink>();
        assert_sync::<DirectorySink>();
        assert_send::<RootWritePolicy>();
        assert_sync::<RootWritePolicy>();
    }
}
