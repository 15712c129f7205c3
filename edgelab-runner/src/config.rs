//! Run configuration — strategy choice plus risk parameters for one run.
//!
//! A `RunConfig` fully determines a run given a price series; its BLAKE3
//! hash is the run's identity for caching and sweep ranking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::config::{ConfigError as RiskConfigError, RiskConfig};
use edgelab_core::strategy::{BuyAndHold, MaCrossover, Strategy};

/// Configuration errors raised before a run starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),
    #[error("ma_crossover requires short_period >= 1 and < long_period, got {short}/{long}")]
    InvalidMaPeriods { short: usize, long: usize },
    #[error("sweep range '{0}' is empty")]
    EmptySweepRange(&'static str),
    #[error(transparent)]
    Risk(#[from] RiskConfigError),
}

/// Strategy selection, one variant per implemented strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    MaCrossover {
        short_period: usize,
        long_period: usize,
        #[serde(default = "default_true")]
        long_only: bool,
    },
    BuyAndHold,
}

fn default_true() -> bool {
    true
}

/// Everything needed to reproduce one backtest (given the same bars).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub initial_capital: f64,
    #[serde(default)]
    pub symbol: String,
}

impl RunConfig {
    /// Validate strategy and risk parameters. Runs fail here, not mid-bar.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if let StrategyConfig::MaCrossover {
            short_period,
            long_period,
            ..
        } = self.strategy
        {
            if short_period < 1 || short_period >= long_period {
                return Err(ConfigError::InvalidMaPeriods {
                    short: short_period,
                    long: long_period,
                });
            }
        }
        self.risk.validate()?;
        Ok(())
    }

    /// Deterministic run identity: BLAKE3 over the canonical JSON form.
    ///
    /// Two identical configs always share a run id, so sweep ranking and
    /// result caching key on semantics rather than construction order.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Instantiate the configured strategy.
    ///
    /// Must be called on a validated config; construction asserts the same
    /// parameter invariants `validate` checks.
    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        match self.strategy {
            StrategyConfig::MaCrossover {
                short_period,
                long_period,
                long_only,
            } => Box::new(MaCrossover::new(short_period, long_period, long_only)),
            StrategyConfig::BuyAndHold => Box::<BuyAndHold>::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::MaCrossover {
                short_period: 10,
                long_period: 30,
                long_only: true,
            },
            risk: RiskConfig::default(),
            initial_capital: 100_000.0,
            symbol: String::new(),
        }
    }
}
