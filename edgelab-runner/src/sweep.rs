//! Parameter sweeps — grid generation and parallel execution.
//!
//! Runs are independent and share only the bar slice, so the sweep fans
//! out over rayon's pool. Results are ranked by the chosen objective and
//! tie-broken by run id, making the output order independent of thread
//! scheduling.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::config::SizingMethod;
use edgelab_core::domain::Bar;

use crate::config::{ConfigError, RunConfig, StrategyConfig};
use crate::fitness::ObjectiveMetric;
use crate::runner::{run_single_backtest, BacktestResult, RunError};

/// Errors from sweep setup and execution.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep of {requested} runs exceeds the ceiling of {limit}")]
    TooManyRuns { requested: usize, limit: usize },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("run {run_id} failed: {source}")]
    Run {
        run_id: String,
        #[source]
        source: RunError,
    },
}

/// Grid of MA crossover periods and risk fractions to sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamGrid {
    pub short_periods: Vec<usize>,
    pub long_periods: Vec<usize>,
    /// Fixed-percent risk fractions; each config in the grid sizes with
    /// `SizingMethod::FixedPercentRisk` at one of these values.
    pub risk_pcts: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            short_periods: vec![10, 20, 30],
            long_periods: vec![50, 100, 200],
            risk_pcts: vec![0.01],
        }
    }
}

impl ParamGrid {
    /// Reject empty ranges before any run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_periods.is_empty() {
            return Err(ConfigError::EmptySweepRange("short_periods"));
        }
        if self.long_periods.is_empty() {
            return Err(ConfigError::EmptySweepRange("long_periods"));
        }
        if self.risk_pcts.is_empty() {
            return Err(ConfigError::EmptySweepRange("risk_pcts"));
        }
        Ok(())
    }

    /// Upper bound on grid size, before invalid period pairs are dropped.
    pub fn size(&self) -> usize {
        self.short_periods.len() * self.long_periods.len() * self.risk_pcts.len()
    }

    /// Generate every valid configuration in the grid. Pairs with
    /// `short >= long` are skipped, never emitted as invalid configs.
    pub fn generate_configs(&self, base: &RunConfig) -> Vec<RunConfig> {
        let long_only = match base.strategy {
            StrategyConfig::MaCrossover { long_only, .. } => long_only,
            StrategyConfig::BuyAndHold => true,
        };

        let mut configs = Vec::new();
        for &short in &self.short_periods {
            for &long in &self.long_periods {
                if short >= long {
                    continue;
                }
                for &risk_pct in &self.risk_pcts {
                    let mut config = base.clone();
                    config.strategy = StrategyConfig::MaCrossover {
                        short_period: short,
                        long_period: long,
                        long_only,
                    };
                    config.risk.sizing = SizingMethod::FixedPercentRisk { risk_pct };
                    configs.push(config);
                }
            }
        }
        configs
    }
}

/// Sweep execution settings.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub objective: ObjectiveMetric,
    /// Hard ceiling on grid size; larger sweeps are rejected up front.
    pub max_runs: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            objective: ObjectiveMetric::default(),
            max_runs: 10_000,
        }
    }
}

/// Run every config in the grid and rank the results.
///
/// Any failing run aborts the sweep; partial sweeps are not reported.
pub fn run_sweep(
    bars: &[Bar],
    base: &RunConfig,
    grid: &ParamGrid,
    opts: &SweepOptions,
) -> Result<SweepResults, SweepError> {
    grid.validate()?;
    let configs = grid.generate_configs(base);
    if configs.is_empty() {
        return Err(ConfigError::EmptySweepRange("valid period pairs").into());
    }
    if configs.len() > opts.max_runs {
        return Err(SweepError::TooManyRuns {
            requested: configs.len(),
            limit: opts.max_runs,
        });
    }

    let mut results: Vec<BacktestResult> = configs
        .par_iter()
        .map(|config| {
            run_single_backtest(bars, config).map_err(|source| SweepError::Run {
                run_id: config.run_id(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let objective = opts.objective;
    results.sort_by(|a, b| {
        rank_order(
            objective,
            objective.extract(&a.report),
            objective.extract(&b.report),
        )
        .then_with(|| a.run_id.cmp(&b.run_id))
    });

    Ok(SweepResults { objective, results })
}

/// Better-first by objective; defined values sort before undefined ones.
fn rank_order(objective: ObjectiveMetric, a: Option<f64>, b: Option<f64>) -> Ordering {
    if objective.is_better(a, b) {
        Ordering::Less
    } else if objective.is_better(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Ranked results of a parameter sweep.
#[derive(Debug)]
pub struct SweepResults {
    objective: ObjectiveMetric,
    results: Vec<BacktestResult>,
}

impl SweepResults {
    /// Which objective the ranking used.
    pub fn objective(&self) -> ObjectiveMetric {
        self.objective
    }

    /// All results, best first.
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Look up one result by run id.
    pub fn get(&self, run_id: &str) -> Option<&BacktestResult> {
        self.results.iter().find(|r| r.run_id == run_id)
    }

    /// The top-ranked result.
    pub fn best(&self) -> Option<&BacktestResult> {
        self.results.first()
    }

    /// The top `n` results, best first.
    pub fn top_n(&self, n: usize) -> &[BacktestResult] {
        &self.results[..n.min(self.results.len())]
    }
}
