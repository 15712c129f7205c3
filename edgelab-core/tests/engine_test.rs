//! Integration tests for the simulation loop.
//!
//! Tests:
//! 1. Fill policies: next-bar-open vs same-bar-close entry prices
//! 2. Exit handling: stop touch, gap-through-stop, take-profit, reversal
//! 3. Equity accounting: curve matches cash + marked position at every bar
//! 4. Malformed bars: equity carry-forward, skip counting
//! 5. Run control: cancellation, warmup, ordering, bar budget
//! 6. Determinism: identical inputs produce identical outputs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use edgelab_core::config::{
    CommissionModel, CostConfig, FillPolicy, RiskConfig, SizingMethod, StopMethod,
};
use edgelab_core::domain::{Bar, ExitReason, Side, Signal, SignalDirection};
use edgelab_core::engine::{run_backtest, EngineError, SimOptions};
use edgelab_core::strategy::{BuyAndHold, Strategy};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

/// N flat bars: open = high = low = close = 100 + i.
fn rising_flat_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let price = 100.0 + i as f64;
            Bar {
                timestamp: start() + Duration::days(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 1_000.0,
            }
        })
        .collect()
}

fn constant_bars(n: usize, price: f64) -> Vec<Bar> {
    (0..n)
        .map(|i| Bar {
            timestamp: start() + Duration::days(i as i64),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1_000.0,
        })
        .collect()
}

/// Frictionless variant of the default config, so fills are hand-checkable.
fn frictionless() -> RiskConfig {
    RiskConfig {
        costs: CostConfig {
            commission: CommissionModel::None,
            slippage_pct: 0.0,
        },
        ..RiskConfig::default()
    }
}

/// Emits a fixed direction at fixed bar indices, nothing else.
struct Scripted {
    signals: Vec<(usize, SignalDirection)>,
}

impl Strategy for Scripted {
    fn on_bar(&mut self, bars: &[Bar], index: usize) -> Option<Signal> {
        self.signals
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, direction)| Signal::new(bars[index].timestamp, *direction))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ──────────────────────────────────────────────
// Fill policies
// ──────────────────────────────────────────────

#[test]
fn next_bar_open_fills_at_following_open() {
    // Signal on bar 0 (buy-and-hold), fill at bar 1's open of 101.
    // Stop 5% below 101 → distance 5.05; 1% of 100k risked → 198 shares.
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.entry_price, 101.0);
    assert_eq!(trade.quantity, 198.0);
    assert_eq!(trade.side, Side::Long);
    assert_eq!(trade.exit_reason, ExitReason::EndOfPeriod);
    assert_eq!(trade.exit_price, 109.0);
    assert_eq!(trade.bars_held, 8);
    assert!((trade.profit_loss - 198.0 * 8.0).abs() < 1e-9);
    assert!((out.final_equity - 101_584.0).abs() < 1e-9);
}

#[test]
fn same_bar_close_fills_at_signal_close() {
    // Signal on bar 0 fills at bar 0's close of 100. Distance 5.0 → 200
    // shares.
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        fill_policy: FillPolicy::SameBarClose,
        ..frictionless()
    };
    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.entry_price, 100.0);
    assert_eq!(trade.quantity, 200.0);
    assert_eq!(trade.bars_held, 9);
    assert!((out.final_equity - 101_800.0).abs() < 1e-9);
}

// ──────────────────────────────────────────────
// Exits
// ──────────────────────────────────────────────

#[test]
fn stop_touch_fills_at_stop_level() {
    // Entry at 100 (bar 1 open), stop at 95. Bar 2 trades down through the
    // stop without gapping: fill at 95 exactly.
    let mut bars = constant_bars(4, 100.0);
    bars[2] = Bar {
        timestamp: start() + Duration::days(2),
        open: 98.0,
        high: 99.0,
        low: 94.0,
        close: 96.0,
        volume: 1_000.0,
    };
    bars[3].open = 96.0;
    bars[3].high = 96.0;
    bars[3].low = 96.0;
    bars[3].close = 96.0;

    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_price, 95.0);
    assert_eq!(trade.quantity, 200.0);
    assert!((trade.profit_loss - 200.0 * -5.0).abs() < 1e-9);
    // Realized: 100k − 200·100 + 200·95
    assert!((out.final_equity - 99_000.0).abs() < 1e-9);
}

#[test]
fn gap_through_stop_fills_at_open() {
    // Bar 2 gaps open at 92, far through the 95 stop: fill at the open,
    // not at the untradeable stop level.
    let mut bars = constant_bars(4, 100.0);
    bars[2] = Bar {
        timestamp: start() + Duration::days(2),
        open: 92.0,
        high: 93.0,
        low: 91.0,
        close: 92.0,
        volume: 1_000.0,
    };
    bars[3].open = 92.0;
    bars[3].high = 92.0;
    bars[3].low = 92.0;
    bars[3].close = 92.0;

    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    let trade = &out.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_price, 92.0);
    assert!((trade.profit_loss - 200.0 * -8.0).abs() < 1e-9);
}

#[test]
fn take_profit_exit() {
    // Entry at 101, stop 95.95, 1R target at 106.05. The rising series
    // reaches it on bar 7 (price 107), gapping over the level: fill at the
    // open.
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        take_profit_ratio: Some(1.0),
        ..frictionless()
    };
    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();

    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.exit_price, 107.0);
    assert_eq!(trade.bars_held, 6);
}

#[test]
fn reversal_closes_and_reopens_at_same_fill() {
    // Long at bar 1's open, reversal signal at bar 3 fills at bar 4's open:
    // the long closes as a signal_reversal trade and a short opens at the
    // same price.
    let bars = constant_bars(8, 100.0);
    let mut strategy = Scripted {
        signals: vec![(0, SignalDirection::Long), (3, SignalDirection::Short)],
    };
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.trades.len(), 2);
    assert_eq!(out.trades[0].side, Side::Long);
    assert_eq!(out.trades[0].exit_reason, ExitReason::SignalReversal);
    assert_eq!(out.trades[0].exit_price, 100.0);
    assert_eq!(out.trades[1].side, Side::Short);
    assert_eq!(out.trades[1].entry_price, 100.0);
    assert_eq!(out.trades[1].exit_reason, ExitReason::EndOfPeriod);
    // Flat prices: both trades wash, equity ends where it started.
    assert!((out.final_equity - 100_000.0).abs() < 1e-9);
}

#[test]
fn flat_signal_closes_without_reopening() {
    let bars = constant_bars(8, 100.0);
    let mut strategy = Scripted {
        signals: vec![(0, SignalDirection::Long), (3, SignalDirection::Flat)],
    };
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].exit_reason, ExitReason::SignalReversal);
}

// ──────────────────────────────────────────────
// Equity accounting and costs
// ──────────────────────────────────────────────

#[test]
fn equity_curve_has_one_point_per_bar() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.equity_curve.len(), bars.len());
    for (point, bar) in out.equity_curve.iter().zip(&bars) {
        assert_eq!(point.timestamp, bar.timestamp);
        assert!(point.equity.is_finite());
    }
    assert_eq!(out.equity_curve[0].equity, 100_000.0);
    assert_eq!(out.equity_curve.last().unwrap().equity, out.final_equity);
}

#[test]
fn per_trade_commission_reduces_pnl() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        costs: CostConfig {
            commission: CommissionModel::PerTrade { amount: 1.0 },
            slippage_pct: 0.0,
        },
        ..RiskConfig::default()
    };
    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();

    let trade = &out.trades[0];
    assert_eq!(trade.fees, 2.0);
    // Gross 198 × 8, less $1 per fill
    assert!((trade.profit_loss - (198.0 * 8.0 - 2.0)).abs() < 1e-9);
    assert!((out.final_equity - 101_582.0).abs() < 1e-9);
}

#[test]
fn slippage_is_adverse_on_both_legs() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        costs: CostConfig {
            commission: CommissionModel::None,
            slippage_pct: 0.001,
        },
        ..RiskConfig::default()
    };
    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();

    let trade = &out.trades[0];
    assert!((trade.entry_price - 101.0 * 1.001).abs() < 1e-9);
    assert!((trade.exit_price - 109.0 * 0.999).abs() < 1e-9);
}

// ──────────────────────────────────────────────
// Malformed bars
// ──────────────────────────────────────────────

#[test]
fn malformed_bar_carries_equity_forward() {
    let mut bars = rising_flat_bars(10);
    bars[5].open = f64::NAN;
    bars[5].high = f64::NAN;
    bars[5].low = f64::NAN;
    bars[5].close = f64::NAN;

    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.skipped_bars, 1);
    assert_eq!(out.equity_curve.len(), 10);
    // The void bar's point marks the position at the last good close.
    assert_eq!(out.equity_curve[5].equity, out.equity_curve[4].equity);
    // The run still ends normally.
    assert!((out.final_equity - 101_584.0).abs() < 1e-9);
}

#[test]
fn void_final_bar_liquidates_at_last_sane_close() {
    // The series ends on a void bar, so end-of-period liquidation falls
    // back to bar 8's close of 108. Entry at 101 for 198 shares, held 7
    // bars: P&L 198 × 7 = 1386.
    let mut bars = rising_flat_bars(10);
    bars[9].open = f64::NAN;
    bars[9].high = f64::NAN;
    bars[9].low = f64::NAN;
    bars[9].close = f64::NAN;

    let mut strategy = BuyAndHold::default();
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &SimOptions::new(100_000.0))
        .unwrap();

    assert_eq!(out.skipped_bars, 1);
    assert_eq!(out.trades.len(), 1);
    let trade = &out.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfPeriod);
    assert_eq!(trade.exit_price, 108.0);
    assert_eq!(trade.exit_time, bars[8].timestamp);
    assert_eq!(trade.bars_held, 7);
    assert!((out.final_equity - 101_386.0).abs() < 1e-9);
    assert_eq!(out.equity_curve.len(), 10);
    for point in &out.equity_curve {
        assert!(point.equity.is_finite());
    }
    assert_eq!(out.equity_curve[9].equity, out.final_equity);
}

// ──────────────────────────────────────────────
// Run control
// ──────────────────────────────────────────────

#[test]
fn cancellation_aborts_without_output() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let cancel = Arc::new(AtomicBool::new(true));
    let opts = SimOptions {
        cancel: Some(cancel),
        ..SimOptions::new(100_000.0)
    };
    let err = run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

#[test]
fn progress_counter_counts_every_bar() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let progress = Arc::new(AtomicUsize::new(0));
    let opts = SimOptions {
        progress: Some(Arc::clone(&progress)),
        ..SimOptions::new(100_000.0)
    };
    run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap();
    assert_eq!(progress.load(Ordering::Relaxed), 10);
}

#[test]
fn cancelled_run_leaves_progress_at_zero() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let progress = Arc::new(AtomicUsize::new(0));
    let opts = SimOptions {
        cancel: Some(Arc::new(AtomicBool::new(true))),
        progress: Some(Arc::clone(&progress)),
        ..SimOptions::new(100_000.0)
    };
    let err = run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(progress.load(Ordering::Relaxed), 0);
}

#[test]
fn wall_clock_budget_is_enforced() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let opts = SimOptions {
        max_duration: Some(std::time::Duration::ZERO),
        ..SimOptions::new(100_000.0)
    };
    let err = run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap_err();
    assert!(matches!(err, EngineError::DeadlineExceeded { .. }));

    // A generous budget does not interfere with a normal run.
    let mut strategy = BuyAndHold::default();
    let opts = SimOptions {
        max_duration: Some(std::time::Duration::from_secs(60)),
        ..SimOptions::new(100_000.0)
    };
    let out = run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap();
    assert_eq!(out.equity_curve.len(), 10);
}

#[test]
fn insufficient_data_for_warmup() {
    // TrailingAtr(14) needs 15 warmup bars; 10 bars cannot start.
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        stop: StopMethod::TrailingAtr {
            atr_period: 14,
            atr_multiplier: 3.0,
        },
        ..frictionless()
    };
    let err = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientData {
            required: 16,
            available: 10
        }
    ));
}

#[test]
fn unordered_series_is_rejected() {
    let mut bars = rising_flat_bars(10);
    bars[4].timestamp = bars[3].timestamp;
    let mut strategy = BuyAndHold::default();
    let err = run_backtest(
        &bars,
        &mut strategy,
        &frictionless(),
        &SimOptions::new(100_000.0),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::UnorderedSeries { index: 4 }));
}

#[test]
fn bar_budget_is_enforced() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let opts = SimOptions {
        max_bars: Some(5),
        ..SimOptions::new(100_000.0)
    };
    let err = run_backtest(&bars, &mut strategy, &frictionless(), &opts).unwrap_err();
    assert!(matches!(
        err,
        EngineError::BarBudgetExceeded { bars: 10, budget: 5 }
    ));
}

#[test]
fn invalid_config_fails_before_simulation() {
    let bars = rising_flat_bars(10);
    let mut strategy = BuyAndHold::default();
    let risk = RiskConfig {
        sizing: SizingMethod::FixedPercentRisk { risk_pct: 2.0 },
        ..frictionless()
    };
    let err = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

// ──────────────────────────────────────────────
// Volatility sizing / ATR stop integration
// ──────────────────────────────────────────────

#[test]
fn volatility_sizing_skips_when_atr_degenerate() {
    // A constant series has zero true range, so ATR is 0 and volatility
    // sizing has no denominator: the entry must be skipped and counted,
    // not filled with a garbage size.
    let bars = constant_bars(30, 100.0);
    let mut strategy = Scripted {
        signals: vec![(16, SignalDirection::Long)],
    };
    let risk = RiskConfig {
        sizing: SizingMethod::Volatility {
            risk_pct: 0.01,
            atr_period: 14,
            atr_multiplier: 2.0,
        },
        ..frictionless()
    };
    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();
    assert!(out.trades.is_empty());
    assert_eq!(out.skipped_signals, 1);
}

// ──────────────────────────────────────────────
// Governor integration
// ──────────────────────────────────────────────

#[test]
fn loss_streak_trips_breaker_and_vetoes_next_entry() {
    // Two stop-outs in a row trip the breaker (limit 2); the third scripted
    // entry is vetoed at its fill bar. Losses are sized large enough that
    // drawdown stays above the 1% recovery threshold, so the breaker holds.
    let mut bars = constant_bars(10, 100.0);
    for i in [3, 6] {
        bars[i].low = 94.0;
    }
    let mut strategy = Scripted {
        signals: vec![
            (1, SignalDirection::Long),
            (4, SignalDirection::Long),
            (7, SignalDirection::Long),
        ],
    };
    let mut risk = RiskConfig {
        sizing: SizingMethod::FixedPercentRisk { risk_pct: 0.05 },
        ..frictionless()
    };
    risk.breaker.consecutive_loss_limit = Some(2);
    risk.breaker.recovery_drawdown = 0.01;

    let out = run_backtest(&bars, &mut strategy, &risk, &SimOptions::new(100_000.0)).unwrap();

    assert_eq!(out.trades.len(), 2);
    assert!(out
        .trades
        .iter()
        .all(|t| t.exit_reason == ExitReason::StopLoss && t.profit_loss < 0.0));
    assert_eq!(out.vetoed_entries, 1);
    assert_eq!(out.skipped_signals, 0);
}

// ──────────────────────────────────────────────
// Determinism
// ──────────────────────────────────────────────

#[test]
fn identical_inputs_produce_identical_outputs() {
    let bars = rising_flat_bars(40);
    let risk = RiskConfig {
        take_profit_ratio: Some(2.0),
        ..RiskConfig::default()
    };
    let opts = SimOptions::new(100_000.0);

    let mut s1 = BuyAndHold::default();
    let mut s2 = BuyAndHold::default();
    let a = run_backtest(&bars, &mut s1, &risk, &opts).unwrap();
    let b = run_backtest(&bars, &mut s2, &risk, &opts).unwrap();
    assert_eq!(a, b);
}
