//! EdgeLab Runner — backtest orchestration, metrics, and sweeps.
//!
//! Sits between `edgelab-core` (pure simulation) and the CLI: turns a
//! serializable [`RunConfig`](config::RunConfig) plus a bar series into a
//! [`PerformanceReport`](report::PerformanceReport), and fans parameter
//! grids out over a rayon pool with deterministic ranking.

pub mod config;
pub mod data_loader;
pub mod fitness;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sweep;

pub use config::{RunConfig, StrategyConfig};
pub use data_loader::load_bars;
pub use fitness::ObjectiveMetric;
pub use report::PerformanceReport;
pub use runner::{run_single_backtest, BacktestResult, RunError, RunHandle, RunStatus};
pub use sweep::{run_sweep, ParamGrid, SweepError, SweepOptions, SweepResults};
