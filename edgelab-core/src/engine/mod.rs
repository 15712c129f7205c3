//! Trade simulator — the bar-by-bar event loop.
//!
//! A single run is a strictly sequential fold: each bar's outcome depends
//! only on state accumulated from earlier bars. All mutable running state
//! lives in one `SimState` threaded through the loop, so a run is fully
//! reproducible from its inputs.
//!
//! Temporal order within a bar: pending entries fill at the open, stop and
//! target touches are checked against the high/low, the strategy is read at
//! the close, and the equity point is appended at the close. Exactly one
//! equity point per bar.

mod state;

pub use state::{SimOptions, SimState};

use std::sync::atomic::Ordering;

use thiserror::Error;

use crate::config::{CommissionModel, ConfigError, FillPolicy, RiskConfig};
use crate::domain::{Bar, EquityPoint, ExitReason, Position, Side, SignalDirection, Trade};
use crate::governor::GovernorDecision;
use crate::indicators::atr;
use crate::sizing::{clamp_quantity, raw_quantity};
use crate::stops::{target_price, ExitManager};
use crate::strategy::Strategy;

/// Errors that abort a run. A cancelled run is a distinct terminal state,
/// not a failure, but like failures it produces no partial report.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("insufficient data: {required} bars required for warmup, {available} available")]
    InsufficientData { required: usize, available: usize },
    #[error("price series is not strictly time-ordered at index {index}")]
    UnorderedSeries { index: usize },
    #[error("run cancelled")]
    Cancelled,
    #[error("bar count {bars} exceeds the per-run budget of {budget}")]
    BarBudgetExceeded { bars: usize, budget: usize },
    #[error("run exceeded the wall-clock budget of {budget:?}")]
    DeadlineExceeded { budget: std::time::Duration },
}

/// Everything a completed run produces. Downstream metric computation is a
/// pure function over this output.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    /// Signals dropped because the clamped size fell below one unit or the
    /// stop context was not yet available.
    pub skipped_signals: usize,
    /// Entries refused by the risk governor.
    pub vetoed_entries: usize,
    /// Malformed bars carried through without processing.
    pub skipped_bars: usize,
    pub warmup_bars: usize,
    pub final_equity: f64,
}

/// What the simulator has committed to do at the next fill opportunity.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingAction {
    Enter(Side),
    /// Close the open position; then open `Some(side)` if the signal
    /// reversed rather than flattened.
    Exit(Option<Side>),
}

/// Run one backtest: a synchronous fold over the price series.
///
/// Deterministic: the output is fully determined by `(bars, strategy, risk,
/// opts)`. Cancellation is cooperative, checked once per bar; a cancelled
/// run returns [`EngineError::Cancelled`] and discards all partial state.
///
/// # Example
///
/// ```no_run
/// use edgelab_core::config::RiskConfig;
/// use edgelab_core::engine::{run_backtest, SimOptions};
/// use edgelab_core::strategy::MaCrossover;
///
/// # let bars = Vec::new();
/// let mut strategy = MaCrossover::new(10, 30, true);
/// let output = run_backtest(
///     &bars,
///     &mut strategy,
///     &RiskConfig::default(),
///     &SimOptions::new(100_000.0),
/// )?;
/// println!("final equity: {}", output.final_equity);
/// # Ok::<(), edgelab_core::engine::EngineError>(())
/// ```
pub fn run_backtest(
    bars: &[Bar],
    strategy: &mut dyn Strategy,
    risk: &RiskConfig,
    opts: &SimOptions,
) -> Result<RunOutput, EngineError> {
    risk.validate()?;

    if let Some(budget) = opts.max_bars {
        if bars.len() > budget {
            return Err(EngineError::BarBudgetExceeded {
                bars: bars.len(),
                budget,
            });
        }
    }

    let warmup = strategy.warmup_bars().max(risk.warmup_bars());
    if bars.len() <= warmup {
        return Err(EngineError::InsufficientData {
            required: warmup + 1,
            available: bars.len(),
        });
    }

    for i in 1..bars.len() {
        if bars[i].timestamp <= bars[i - 1].timestamp {
            return Err(EngineError::UnorderedSeries { index: i });
        }
    }

    // Precompute the ATR series once if any risk method consumes it.
    let atr_series = risk.atr_period().map(|period| atr(bars, period));
    let atr_slice = atr_series.as_deref();
    let exits = ExitManager::new(&risk.stop, atr_slice);

    let mut state = SimState::new(opts, risk.breaker.clone());
    let mut pending: Option<PendingAction> = None;
    let started = std::time::Instant::now();

    for (i, bar) in bars.iter().enumerate() {
        if let Some(cancel) = &opts.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }
        }
        if let Some(budget) = opts.max_duration {
            if started.elapsed() >= budget {
                return Err(EngineError::DeadlineExceeded { budget });
            }
        }
        if let Some(progress) = &opts.progress {
            progress.fetch_add(1, Ordering::Relaxed);
        }

        if !bar.is_sane() {
            // Malformed bar: no fills, no strategy read; carry equity
            // forward at the last good price so the curve stays gapless.
            state.skipped_bars += 1;
            let equity = state.mark_to_market(state.last_price);
            state.push_equity(bar.timestamp, equity);
            continue;
        }

        // Open: fill the action committed on the previous close.
        if let Some(action) = pending.take() {
            apply_action(&mut state, action, bars, i, bar.open, risk, &exits, atr_slice);
        }

        // Intrabar: stop/target touch against high/low. The stop in force
        // is derived from state as of the prior close.
        if let Some(position) = &mut state.position {
            position.stop_price = exits.current_stop(position, i.saturating_sub(1));
            if let Some(fill) = ExitManager::check_exit(position, bar) {
                close_position(&mut state, fill.price, bar, i, fill.reason, risk);
            } else {
                // Survived the bar: fold its extremes into trailing state.
                position.update_best_favorable(bar.high, bar.low);
            }
        }

        // Close: read the strategy and commit the next action.
        if i >= warmup {
            if let Some(signal) = strategy.on_bar(bars, i) {
                match plan_action(state.position.as_ref(), signal.direction) {
                    Some(action) if risk.fill_policy == FillPolicy::SameBarClose => {
                        apply_action(
                            &mut state, action, bars, i, bar.close, risk, &exits, atr_slice,
                        );
                    }
                    Some(action) => pending = Some(action),
                    None => {}
                }
            }
        }

        // Close: mark-to-market, one equity point per bar.
        state.last_price = bar.close;
        let equity = state.mark_to_market(bar.close);
        state.push_equity(bar.timestamp, equity);
    }

    // End of period: liquidate at the last sane close, then re-mark the
    // last equity point so the curve ends at realized equity. A trailing
    // malformed bar has no usable close, so the liquidation falls back to
    // the most recent sane bar.
    if state.position.is_some() {
        if let Some(i) = bars.iter().rposition(|b| b.is_sane()) {
            close_position(
                &mut state,
                bars[i].close,
                &bars[i],
                i,
                ExitReason::EndOfPeriod,
                risk,
            );
            let equity = state.mark_to_market(bars[i].close);
            state.replace_last_equity(equity);
        }
    }

    let final_equity = state
        .equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(opts.initial_capital);

    Ok(RunOutput {
        equity_curve: state.equity_curve,
        trades: state.trades,
        skipped_signals: state.skipped_signals,
        vetoed_entries: state.vetoed_entries,
        skipped_bars: state.skipped_bars,
        warmup_bars: warmup,
        final_equity,
    })
}

/// Decide what a signal means given the current holding. `None` means the
/// signal is redundant (already positioned that way, or flat and told to
/// stay flat).
fn plan_action(position: Option<&Position>, direction: SignalDirection) -> Option<PendingAction> {
    match (position, direction) {
        (None, SignalDirection::Long) => Some(PendingAction::Enter(Side::Long)),
        (None, SignalDirection::Short) => Some(PendingAction::Enter(Side::Short)),
        (None, SignalDirection::Flat) => None,
        (Some(_), SignalDirection::Flat) => Some(PendingAction::Exit(None)),
        (Some(p), SignalDirection::Long) => match p.side {
            Side::Long => None,
            Side::Short => Some(PendingAction::Exit(Some(Side::Long))),
        },
        (Some(p), SignalDirection::Short) => match p.side {
            Side::Short => None,
            Side::Long => Some(PendingAction::Exit(Some(Side::Short))),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_action(
    state: &mut SimState,
    action: PendingAction,
    bars: &[Bar],
    index: usize,
    raw_price: f64,
    risk: &RiskConfig,
    exits: &ExitManager<'_>,
    atr: Option<&[f64]>,
) {
    match action {
        PendingAction::Enter(side) => {
            try_enter(state, side, bars, index, raw_price, risk, exits, atr);
        }
        PendingAction::Exit(reenter) => {
            if state.position.is_some() {
                close_position(
                    state,
                    raw_price,
                    &bars[index],
                    index,
                    ExitReason::SignalReversal,
                    risk,
                );
            }
            if let Some(side) = reenter {
                try_enter(state, side, bars, index, raw_price, risk, exits, atr);
            }
        }
    }
}

/// Attempt an entry at `raw_price` on bar `index`.
///
/// Consults the governor, places the initial stop, sizes and clamps the
/// order, and applies slippage and commission. A refused or unsizable
/// entry is counted and skipped, never fatal.
#[allow(clippy::too_many_arguments)]
fn try_enter(
    state: &mut SimState,
    side: Side,
    bars: &[Bar],
    index: usize,
    raw_price: f64,
    risk: &RiskConfig,
    exits: &ExitManager<'_>,
    atr: Option<&[f64]>,
) {
    if state.position.is_some() {
        return;
    }

    let scale = match state.governor.assess_entry() {
        GovernorDecision::Allow { scale } => scale,
        GovernorDecision::Veto(_) => {
            state.vetoed_entries += 1;
            return;
        }
    };

    // Slippage is adverse on entry: paying up for longs, down for shorts.
    let entry_price = raw_price * (1.0 + side.sign() * risk.costs.slippage_pct);

    // Risk context is read from the bar preceding a next-open fill, or the
    // signal bar itself for a same-close fill. Never from future bars.
    let context_index = match risk.fill_policy {
        FillPolicy::NextBarOpen => index.saturating_sub(1),
        FillPolicy::SameBarClose => index,
    };
    let stop_price = match exits.initial_stop(side, entry_price, bars, context_index) {
        Some(stop) => stop,
        None => {
            state.skipped_signals += 1;
            return;
        }
    };

    let stop_distance = (entry_price - stop_price).abs();
    let equity = state.mark_to_market(raw_price);
    let atr_value = atr
        .and_then(|series| series.get(context_index).copied())
        .filter(|v| v.is_finite() && *v > 0.0);

    let quantity =
        raw_quantity(&risk.sizing, equity, stop_distance, atr_value, &state.trades) * scale;
    let quantity = clamp_quantity(
        quantity,
        entry_price,
        equity,
        risk.min_trade_unit,
        risk.max_exposure_pct,
    );
    if quantity <= 0.0 {
        state.skipped_signals += 1;
        return;
    }

    let target = risk
        .take_profit_ratio
        .map(|ratio| target_price(side, entry_price, stop_price, ratio));

    let fee = commission(&risk.costs.commission, quantity, entry_price);
    state.cash -= side.sign() * quantity * entry_price;
    state.cash -= fee;
    state.open_fees = fee;

    state.position = Some(Position {
        symbol: state.symbol.clone(),
        side,
        entry_price,
        entry_time: bars[index].timestamp,
        entry_bar: index,
        quantity,
        stop_price,
        target_price: target,
        best_favorable: entry_price,
    });
}

/// Close the open position at `raw_price`, realize P&L, append a trade to
/// the ledger, and feed the governor's streak accumulator.
fn close_position(
    state: &mut SimState,
    raw_price: f64,
    bar: &Bar,
    index: usize,
    reason: ExitReason,
    risk: &RiskConfig,
) {
    let Some(position) = state.position.take() else {
        return;
    };

    // Slippage is adverse on exit: selling down for longs, covering up for
    // shorts.
    let exit_price = raw_price * (1.0 - position.side.sign() * risk.costs.slippage_pct);
    let exit_fee = commission(&risk.costs.commission, position.quantity, exit_price);

    state.cash += position.side.sign() * position.quantity * exit_price;
    state.cash -= exit_fee;

    let fees = state.open_fees + exit_fee;
    state.open_fees = 0.0;

    let gross = position.unrealized_pnl(exit_price);
    let net = gross - fees;
    let entry_cost = position.entry_price * position.quantity;

    let trade = Trade {
        entry_time: position.entry_time,
        exit_time: bar.timestamp,
        entry_price: position.entry_price,
        exit_price,
        quantity: position.quantity,
        side: position.side,
        profit_loss: net,
        profit_loss_percent: if entry_cost > 0.0 { net / entry_cost } else { 0.0 },
        exit_reason: reason,
        fees,
        bars_held: index - position.entry_bar,
    };
    state.governor.record_trade(&trade);
    state.trades.push(trade);
}

fn commission(model: &CommissionModel, quantity: f64, price: f64) -> f64 {
    match model {
        CommissionModel::PerTrade { amount } => *amount,
        CommissionModel::Percentage { rate } => quantity * price * rate,
        CommissionModel::None => 0.0,
    }
}
