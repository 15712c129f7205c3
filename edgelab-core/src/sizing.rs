//! Position sizing — converts a signal and current equity into a quantity.
//!
//! Every method is a pure function of its inputs. Clamping to the minimum
//! tradeable unit and the exposure cap is a deterministic floor/cap applied
//! after the raw size; a result of 0.0 means "skip the signal".

use crate::config::SizingMethod;
use crate::domain::Trade;

/// Kelly inputs estimated from the trailing trade ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellyEstimate {
    pub win_rate: f64,
    pub reward_risk: f64,
}

/// Raw Kelly bet fraction: `(winRate × (1 + RR) − lossRate) / RR`.
///
/// winRate=0.6, RR=1.5 → (0.6 × 2.5 − 0.4) / 1.5 = 0.7333…
pub fn kelly_fraction(win_rate: f64, reward_risk: f64) -> f64 {
    if reward_risk <= 0.0 {
        return 0.0;
    }
    let loss_rate = 1.0 - win_rate;
    (win_rate * (1.0 + reward_risk) - loss_rate) / reward_risk
}

/// Estimate Kelly inputs from the last `lookback` trades.
///
/// Falls back to the configured priors until `lookback` trades exist, and
/// for the reward/risk ratio whenever the window has no winners or no
/// losers (the ratio is not estimable from a one-sided sample).
pub fn estimate_kelly_inputs(
    ledger: &[Trade],
    lookback: usize,
    prior_win_rate: f64,
    prior_reward_risk: f64,
) -> KellyEstimate {
    if lookback == 0 || ledger.len() < lookback {
        return KellyEstimate {
            win_rate: prior_win_rate,
            reward_risk: prior_reward_risk,
        };
    }

    let window = &ledger[ledger.len() - lookback..];
    let wins: Vec<f64> = window
        .iter()
        .filter(|t| t.profit_loss > 0.0)
        .map(|t| t.profit_loss)
        .collect();
    let losses: Vec<f64> = window
        .iter()
        .filter(|t| t.profit_loss < 0.0)
        .map(|t| t.profit_loss.abs())
        .collect();

    let win_rate = wins.len() as f64 / window.len() as f64;
    let reward_risk = if wins.is_empty() || losses.is_empty() {
        prior_reward_risk
    } else {
        let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
        let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
        avg_win / avg_loss
    };

    KellyEstimate {
        win_rate,
        reward_risk,
    }
}

/// Raw (unclamped) quantity for an entry.
///
/// `stop_distance` is |entry − stop|; `atr` is the precomputed indicator
/// value at the sizing bar (required by the volatility method).
/// Returns 0.0 when the method's denominator degenerates.
pub fn raw_quantity(
    method: &SizingMethod,
    equity: f64,
    stop_distance: f64,
    atr: Option<f64>,
    ledger: &[Trade],
) -> f64 {
    if equity <= 0.0 {
        return 0.0;
    }

    match method {
        SizingMethod::FixedPercentRisk { risk_pct } => {
            if stop_distance <= 0.0 {
                return 0.0;
            }
            equity * risk_pct / stop_distance
        }
        SizingMethod::FixedDollarRisk { risk_dollars } => {
            if stop_distance <= 0.0 {
                return 0.0;
            }
            risk_dollars / stop_distance
        }
        SizingMethod::Volatility {
            risk_pct,
            atr_multiplier,
            ..
        } => {
            let atr = match atr {
                Some(a) if a.is_finite() && a > 0.0 => a,
                _ => return 0.0,
            };
            equity * risk_pct / (atr * atr_multiplier)
        }
        SizingMethod::Kelly {
            fraction,
            lookback,
            prior_win_rate,
            prior_reward_risk,
        } => {
            if stop_distance <= 0.0 {
                return 0.0;
            }
            let est =
                estimate_kelly_inputs(ledger, *lookback, *prior_win_rate, *prior_reward_risk);
            let kelly = kelly_fraction(est.win_rate, est.reward_risk).max(0.0);
            equity * kelly * fraction / stop_distance
        }
    }
}

/// Floor to a multiple of the minimum tradeable unit and cap notional at
/// `max_exposure_pct` of equity. Returns 0.0 when the clamped quantity
/// falls below one unit (insufficient equity → skip, not fatal).
pub fn clamp_quantity(
    quantity: f64,
    entry_price: f64,
    equity: f64,
    min_trade_unit: f64,
    max_exposure_pct: f64,
) -> f64 {
    if quantity <= 0.0 || entry_price <= 0.0 {
        return 0.0;
    }

    let exposure_cap = equity * max_exposure_pct / entry_price;
    let capped = quantity.min(exposure_cap);
    let units = (capped / min_trade_unit).floor();
    if units < 1.0 {
        return 0.0;
    }
    units * min_trade_unit
}
