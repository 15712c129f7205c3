//! RiskConfig — immutable per-run risk parameters.
//!
//! Sizing and stop methods are closed sets of tagged variants with a
//! parameter payload per kind, dispatched in `sizing` and `stops`. Adding
//! a method is a reviewable enum extension, never open string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors — fail fast, before any bar is simulated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("risk percentage must be in (0, 1), got {0}")]
    InvalidRiskPct(f64),
    #[error("stop percentage must be in (0, 1), got {0}")]
    InvalidStopPct(f64),
    #[error("{0} must be positive, got {1}")]
    NonPositive(&'static str, f64),
    #[error("stop and target are inverted: stop {stop} vs target {target} for a {side} entry")]
    InvertedStopTarget {
        side: &'static str,
        stop: f64,
        target: f64,
    },
    #[error("take-profit ratio must be positive, got {0}")]
    InvalidTakeProfitRatio(f64),
    #[error("kelly fraction must be in (0, 1], got {0}")]
    InvalidKellyFraction(f64),
    #[error("swing lookback must be >= 2 bars, got {0}")]
    InvalidSwingLookback(usize),
    #[error("breaker recovery drawdown {recovery} must be below the critical drawdown {critical}")]
    BreakerThresholdsInverted { critical: f64, recovery: f64 },
}

/// When an entry signal is converted into a fill.
///
/// Run-wide and explicit: it materially changes every result, so it is part
/// of the hashed configuration rather than an engine default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Signal computed at a bar's close fills at the *next* bar's open.
    /// No look-ahead: the fill price is unknown when the signal fires.
    #[default]
    NextBarOpen,
    /// Fill immediately at the signal bar's close.
    SameBarClose,
}

/// Position sizing method, one variant per formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingMethod {
    /// quantity = (equity × risk_pct) / |entry − stop|
    FixedPercentRisk { risk_pct: f64 },
    /// quantity = risk_dollars / |entry − stop|
    FixedDollarRisk { risk_dollars: f64 },
    /// quantity = (equity × risk_pct) / (ATR × atr_multiplier).
    /// ATR comes precomputed from the indicator layer.
    Volatility {
        risk_pct: f64,
        atr_period: usize,
        atr_multiplier: f64,
    },
    /// Fractional Kelly. win_rate and reward_risk are estimated from the
    /// trailing trade ledger; the priors apply until `lookback` trades exist.
    Kelly {
        fraction: f64,
        lookback: usize,
        prior_win_rate: f64,
        prior_reward_risk: f64,
    },
}

/// Stop-loss placement method, one variant per formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopMethod {
    /// Fixed percent below (long) / above (short) the entry price.
    FixedPercent { stop_pct: f64 },
    /// Recent swing low (long) / swing high (short) over `lookback` bars,
    /// padded by `buffer_pct`.
    SwingLevel { lookback: usize, buffer_pct: f64 },
    /// entry − ATR × multiplier (long), entry + ATR × multiplier (short).
    Volatility {
        atr_period: usize,
        atr_multiplier: f64,
    },
    /// Trailing percent off the best favorable price since entry.
    /// Only ever tightens.
    TrailingPercent { trail_pct: f64 },
    /// Trailing ATR stop off the best favorable price since entry.
    TrailingAtr {
        atr_period: usize,
        atr_multiplier: f64,
    },
}

impl StopMethod {
    /// Whether the stop is recomputed from the favorable high-water mark
    /// each bar (trailing) or anchored to the entry.
    pub fn is_trailing(&self) -> bool {
        matches!(self, Self::TrailingPercent { .. } | Self::TrailingAtr { .. })
    }

    /// ATR period required by this method, if any.
    pub fn atr_period(&self) -> Option<usize> {
        match self {
            Self::Volatility { atr_period, .. } | Self::TrailingAtr { atr_period, .. } => {
                Some(*atr_period)
            }
            _ => None,
        }
    }
}

/// Circuit breaker and throttle thresholds for the risk governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Drawdown at which new entries are scaled down toward min_risk_fraction.
    pub max_acceptable_drawdown: f64,
    /// Floor for the drawdown throttle scale.
    pub min_risk_fraction: f64,
    /// Drawdown at which the breaker trips and vetoes all new entries.
    pub critical_drawdown: f64,
    /// Drawdown under which a tripped breaker releases.
    pub recovery_drawdown: f64,
    /// Consecutive losing trades that trip the breaker. None disables the rule.
    pub consecutive_loss_limit: Option<usize>,
    /// Realized volatility (std of bar returns over `volatility_window`)
    /// that trips the breaker. None disables the rule.
    pub volatility_spike_threshold: Option<f64>,
    pub volatility_window: usize,
    /// Veto entries while an SMA of the equity curve is declining.
    pub equity_filter_period: Option<usize>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_acceptable_drawdown: 0.20,
            min_risk_fraction: 0.25,
            critical_drawdown: 0.30,
            recovery_drawdown: 0.15,
            consecutive_loss_limit: None,
            volatility_spike_threshold: None,
            volatility_window: 20,
            equity_filter_period: None,
        }
    }
}

/// Transaction cost model, applied symmetrically on entry and exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionModel {
    /// Fixed amount per fill.
    PerTrade { amount: f64 },
    /// Fraction of fill notional.
    Percentage { rate: f64 },
    None,
}

/// Execution cost settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    pub commission: CommissionModel,
    /// Slippage as a fraction of fill price, adverse on both legs.
    pub slippage_pct: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            commission: CommissionModel::Percentage { rate: 0.0005 },
            slippage_pct: 0.0005,
        }
    }
}

/// Immutable risk parameters for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub sizing: SizingMethod,
    pub stop: StopMethod,
    /// Take-profit target as a multiple of the stop distance
    /// (e.g. 2.0 = 2R). None disables targets.
    pub take_profit_ratio: Option<f64>,
    pub breaker: BreakerConfig,
    pub fill_policy: FillPolicy,
    pub costs: CostConfig,
    /// Smallest tradeable quantity; sized orders are floored to a multiple
    /// of this, and anything below it is skipped.
    pub min_trade_unit: f64,
    /// Cap on position notional as a fraction of equity.
    pub max_exposure_pct: f64,
}

impl RiskConfig {
    /// Validate the configuration. Called by the engine before the first
    /// bar; a failing config never partially runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.sizing {
            SizingMethod::FixedPercentRisk { risk_pct }
            | SizingMethod::Volatility { risk_pct, .. } => {
                if *risk_pct <= 0.0 || *risk_pct >= 1.0 {
                    return Err(ConfigError::InvalidRiskPct(*risk_pct));
                }
            }
            SizingMethod::FixedDollarRisk { risk_dollars } => {
                if *risk_dollars <= 0.0 {
                    return Err(ConfigError::NonPositive("risk_dollars", *risk_dollars));
                }
            }
            SizingMethod::Kelly {
                fraction,
                prior_win_rate,
                prior_reward_risk,
                ..
            } => {
                if *fraction <= 0.0 || *fraction > 1.0 {
                    return Err(ConfigError::InvalidKellyFraction(*fraction));
                }
                if *prior_win_rate <= 0.0 || *prior_win_rate >= 1.0 {
                    return Err(ConfigError::InvalidRiskPct(*prior_win_rate));
                }
                if *prior_reward_risk <= 0.0 {
                    return Err(ConfigError::NonPositive(
                        "prior_reward_risk",
                        *prior_reward_risk,
                    ));
                }
            }
        }

        match &self.stop {
            StopMethod::FixedPercent { stop_pct } => {
                if *stop_pct <= 0.0 || *stop_pct >= 1.0 {
                    return Err(ConfigError::InvalidStopPct(*stop_pct));
                }
            }
            StopMethod::SwingLevel { lookback, buffer_pct } => {
                if *lookback < 2 {
                    return Err(ConfigError::InvalidSwingLookback(*lookback));
                }
                if *buffer_pct < 0.0 {
                    return Err(ConfigError::NonPositive("buffer_pct", *buffer_pct));
                }
            }
            StopMethod::Volatility { atr_multiplier, .. }
            | StopMethod::TrailingAtr { atr_multiplier, .. } => {
                if *atr_multiplier <= 0.0 {
                    return Err(ConfigError::NonPositive("atr_multiplier", *atr_multiplier));
                }
            }
            StopMethod::TrailingPercent { trail_pct } => {
                if *trail_pct <= 0.0 || *trail_pct >= 1.0 {
                    return Err(ConfigError::InvalidStopPct(*trail_pct));
                }
            }
        }

        if let Some(ratio) = self.take_profit_ratio {
            // ratio <= 0 puts the target on the stop side of the entry,
            // i.e. an inverted bracket.
            if ratio <= 0.0 {
                return Err(ConfigError::InvalidTakeProfitRatio(ratio));
            }
        }

        if self.breaker.recovery_drawdown >= self.breaker.critical_drawdown {
            return Err(ConfigError::BreakerThresholdsInverted {
                critical: self.breaker.critical_drawdown,
                recovery: self.breaker.recovery_drawdown,
            });
        }
        if self.breaker.min_risk_fraction <= 0.0 || self.breaker.min_risk_fraction > 1.0 {
            return Err(ConfigError::NonPositive(
                "min_risk_fraction",
                self.breaker.min_risk_fraction,
            ));
        }
        if self.breaker.max_acceptable_drawdown <= 0.0 {
            return Err(ConfigError::NonPositive(
                "max_acceptable_drawdown",
                self.breaker.max_acceptable_drawdown,
            ));
        }

        if self.min_trade_unit <= 0.0 {
            return Err(ConfigError::NonPositive("min_trade_unit", self.min_trade_unit));
        }
        if self.max_exposure_pct <= 0.0 {
            return Err(ConfigError::NonPositive("max_exposure_pct", self.max_exposure_pct));
        }
        if self.costs.slippage_pct < 0.0 {
            return Err(ConfigError::NonPositive("slippage_pct", self.costs.slippage_pct));
        }

        Ok(())
    }

    /// ATR period required by the sizing or stop method, if either uses ATR.
    pub fn atr_period(&self) -> Option<usize> {
        if let SizingMethod::Volatility { atr_period, .. } = &self.sizing {
            return Some(*atr_period);
        }
        self.stop.atr_period()
    }

    /// Extra history bars the risk layer needs before the first entry.
    pub fn warmup_bars(&self) -> usize {
        let atr = self.atr_period().map(|p| p + 1).unwrap_or(0);
        let swing = match self.stop {
            StopMethod::SwingLevel { lookback, .. } => lookback,
            _ => 0,
        };
        atr.max(swing)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sizing: SizingMethod::FixedPercentRisk { risk_pct: 0.01 },
            stop: StopMethod::FixedPercent { stop_pct: 0.05 },
            take_profit_ratio: None,
            breaker: BreakerConfig::default(),
            fill_policy: FillPolicy::default(),
            costs: CostConfig::default(),
            min_trade_unit: 1.0,
            max_exposure_pct: 1.0,
        }
    }
}
