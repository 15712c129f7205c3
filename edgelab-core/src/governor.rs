//! Risk governor — throttles or halts new entries.
//!
//! State is derived incrementally from the simulator's equity and trade
//! streams (never recomputed from full history mid-run). The incremental
//! accumulators are equivalent to a from-scratch recomputation; the
//! property tests assert this directly.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BreakerConfig;
use crate::domain::{EquityPoint, Trade};

/// Why the governor refused an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoReason {
    CircuitBreakerActive,
    EquityCurveDeclining,
}

/// Outcome of consulting the governor before an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GovernorDecision {
    /// Entry allowed; requested size is multiplied by `scale` (≤ 1.0).
    Allow { scale: f64 },
    Veto(VetoReason),
}

/// What tripped the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerTrigger {
    CriticalDrawdown,
    ConsecutiveLosses,
    VolatilitySpike,
}

/// Stateful risk governor, consulted before every new entry.
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    config: BreakerConfig,
    peak_equity: f64,
    current_drawdown: f64,
    consecutive_losses: usize,
    breaker_active: bool,
    breaker_trigger: Option<BreakerTrigger>,
    breaker_activated_at: Option<DateTime<Utc>>,
    breaker_deactivated_at: Option<DateTime<Utc>>,
    last_equity: Option<f64>,
    /// Rolling window of bar returns for the volatility-spike rule.
    returns: VecDeque<f64>,
    /// Rolling window of equity values for the equity-curve SMA filter.
    equity_window: VecDeque<f64>,
}

impl RiskGovernor {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            peak_equity: 0.0,
            current_drawdown: 0.0,
            consecutive_losses: 0,
            breaker_active: false,
            breaker_trigger: None,
            breaker_activated_at: None,
            breaker_deactivated_at: None,
            last_equity: None,
            returns: VecDeque::new(),
            equity_window: VecDeque::new(),
        }
    }

    pub fn current_drawdown(&self) -> f64 {
        self.current_drawdown
    }

    pub fn consecutive_losses(&self) -> usize {
        self.consecutive_losses
    }

    pub fn breaker_active(&self) -> bool {
        self.breaker_active
    }

    pub fn breaker_trigger(&self) -> Option<BreakerTrigger> {
        self.breaker_trigger
    }

    pub fn breaker_activated_at(&self) -> Option<DateTime<Utc>> {
        self.breaker_activated_at
    }

    pub fn breaker_deactivated_at(&self) -> Option<DateTime<Utc>> {
        self.breaker_deactivated_at
    }

    /// Fold one equity observation into the accumulators.
    ///
    /// Updates the running peak/drawdown, the volatility window, the equity
    /// SMA window, and trips or releases the breaker as thresholds are
    /// crossed.
    pub fn observe_equity(&mut self, point: &EquityPoint) {
        if point.equity > self.peak_equity {
            self.peak_equity = point.equity;
        }
        self.current_drawdown = if self.peak_equity > 0.0 {
            (self.peak_equity - point.equity) / self.peak_equity
        } else {
            0.0
        };

        if let Some(last) = self.last_equity {
            if last > 0.0 {
                self.returns.push_back((point.equity - last) / last);
                if self.returns.len() > self.config.volatility_window {
                    self.returns.pop_front();
                }
            }
        }
        self.last_equity = Some(point.equity);

        if let Some(period) = self.config.equity_filter_period {
            self.equity_window.push_back(point.equity);
            // Need period + 1 values to compare two consecutive SMAs.
            if self.equity_window.len() > period + 1 {
                self.equity_window.pop_front();
            }
        }

        if self.breaker_active {
            if self.current_drawdown <= self.config.recovery_drawdown {
                self.breaker_active = false;
                self.breaker_trigger = None;
                self.breaker_deactivated_at = Some(point.timestamp);
            }
        } else {
            if self.current_drawdown >= self.config.critical_drawdown {
                self.trip(BreakerTrigger::CriticalDrawdown, point.timestamp);
            } else if let Some(threshold) = self.config.volatility_spike_threshold {
                if self.returns.len() >= self.config.volatility_window
                    && realized_volatility(self.returns.make_contiguous()) > threshold
                {
                    self.trip(BreakerTrigger::VolatilitySpike, point.timestamp);
                }
            }
        }
    }

    /// Fold one closed trade into the loss-streak accumulator.
    pub fn record_trade(&mut self, trade: &Trade) {
        if trade.profit_loss < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        if !self.breaker_active {
            if let Some(limit) = self.config.consecutive_loss_limit {
                if self.consecutive_losses >= limit {
                    self.trip(BreakerTrigger::ConsecutiveLosses, trade.exit_time);
                }
            }
        }
    }

    /// Consult the governor before a new entry. Rules in order: circuit
    /// breaker veto, equity-curve filter veto, drawdown throttle scale.
    pub fn assess_entry(&self) -> GovernorDecision {
        if self.breaker_active {
            return GovernorDecision::Veto(VetoReason::CircuitBreakerActive);
        }

        if let Some(period) = self.config.equity_filter_period {
            if self.equity_sma_declining(period) {
                return GovernorDecision::Veto(VetoReason::EquityCurveDeclining);
            }
        }

        let scale = (1.0 - self.current_drawdown / self.config.max_acceptable_drawdown)
            .max(self.config.min_risk_fraction)
            .min(1.0);
        GovernorDecision::Allow { scale }
    }

    fn trip(&mut self, trigger: BreakerTrigger, at: DateTime<Utc>) {
        self.breaker_active = true;
        self.breaker_trigger = Some(trigger);
        self.breaker_activated_at = Some(at);
    }

    fn equity_sma_declining(&self, period: usize) -> bool {
        if self.equity_window.len() < period + 1 {
            return false;
        }
        let values: Vec<f64> = self.equity_window.iter().copied().collect();
        let n = values.len();
        let sma_now: f64 = values[n - period..].iter().sum::<f64>() / period as f64;
        let sma_prev: f64 = values[n - period - 1..n - 1].iter().sum::<f64>() / period as f64;
        sma_now < sma_prev
    }
}

/// Sample standard deviation of a return series.
pub fn realized_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() - 1) as f64;
    variance.sqrt()
}
