//! Single-run orchestration — config in, report out.
//!
//! Two entry points:
//! - `run_single_backtest()`: synchronous, used by the CLI and by sweeps.
//! - `RunHandle::spawn()`: runs on a worker thread with cooperative
//!   cancellation, for callers that must stay responsive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::domain::Bar;
use edgelab_core::engine::{run_backtest, EngineError, SimOptions};

use crate::config::{ConfigError, RunConfig};
use crate::report::PerformanceReport;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("run thread panicked")]
    Panicked,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// BLAKE3 hash of the config, the run's stable identity.
    pub run_id: String,
    pub config: RunConfig,
    pub warmup_bars: usize,
    pub report: PerformanceReport,
}

/// Run one backtest synchronously.
pub fn run_single_backtest(bars: &[Bar], config: &RunConfig) -> Result<BacktestResult, RunError> {
    execute(bars, config, None, None, None)
}

/// As [`run_single_backtest`], with a bar budget and/or a cancel flag.
///
/// A pre-tripped flag cancels before the first bar; the engine checks it
/// between bars, so cancellation latency is one bar of work.
pub fn run_backtest_with_options(
    bars: &[Bar],
    config: &RunConfig,
    max_bars: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<BacktestResult, RunError> {
    execute(bars, config, max_bars, cancel, None)
}

fn execute(
    bars: &[Bar],
    config: &RunConfig,
    max_bars: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
    progress: Option<Arc<AtomicUsize>>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let mut strategy = config.build_strategy();
    let opts = SimOptions {
        initial_capital: config.initial_capital,
        symbol: config.symbol.clone(),
        max_bars,
        cancel,
        progress,
        max_duration: None,
    };
    let output = run_backtest(bars, strategy.as_mut(), &config.risk, &opts)?;
    Ok(BacktestResult {
        run_id: config.run_id(),
        config: config.clone(),
        warmup_bars: output.warmup_bars,
        report: PerformanceReport::compute(&output),
    })
}

/// Terminal state of a spawned run.
#[derive(Debug)]
pub enum RunStatus {
    Completed(Box<BacktestResult>),
    Cancelled,
    Failed(RunError),
}

/// Handle to a backtest running on a worker thread.
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    progress: Arc<AtomicUsize>,
    total_bars: usize,
    handle: JoinHandle<Result<BacktestResult, RunError>>,
}

impl RunHandle {
    /// Spawn the run. Bars and config move to the worker thread.
    pub fn spawn(bars: Vec<Bar>, config: RunConfig) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(AtomicUsize::new(0));
        let total_bars = bars.len();
        let flag = Arc::clone(&cancel);
        let counter = Arc::clone(&progress);
        let handle =
            thread::spawn(move || execute(&bars, &config, None, Some(flag), Some(counter)));
        Self {
            cancel,
            progress,
            total_bars,
            handle,
        }
    }

    /// Request cancellation. The run stops at the next bar boundary and
    /// joins as `RunStatus::Cancelled`; no partial report is produced.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Bars consumed so far, out of the total in the series. The first
    /// number reaches the second once the engine has seen every bar.
    pub fn progress(&self) -> (usize, usize) {
        (self.progress.load(Ordering::Relaxed), self.total_bars)
    }

    /// Wait for the run and fold its outcome into a terminal status.
    pub fn join(self) -> RunStatus {
        match self.handle.join() {
            Ok(Ok(result)) => RunStatus::Completed(Box::new(result)),
            Ok(Err(RunError::Engine(EngineError::Cancelled))) => RunStatus::Cancelled,
            Ok(Err(err)) => RunStatus::Failed(err),
            Err(_) => RunStatus::Failed(RunError::Panicked),
        }
    }
}
