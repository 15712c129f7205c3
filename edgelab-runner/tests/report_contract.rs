//! Report output contract.
//!
//! Tests:
//! 1. Hand-computed trade statistics on a known three-trade ledger
//! 2. Idempotence: recomputing a report changes nothing
//! 3. JSON field names, which downstream tooling parses by name
//! 4. End-to-end determinism through config, engine, and report

use chrono::{Duration, TimeZone, Utc};

use edgelab_core::config::{CommissionModel, CostConfig};
use edgelab_core::domain::{Bar, EquityPoint, ExitReason, Side, Trade};
use edgelab_core::engine::RunOutput;
use edgelab_runner::config::StrategyConfig;
use edgelab_runner::{run_single_backtest, PerformanceReport, RunConfig};

fn trade(day: i64, pnl: f64) -> Trade {
    let entry = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day);
    Trade {
        entry_time: entry,
        exit_time: entry + Duration::days(5),
        entry_price: 100.0,
        exit_price: 100.0 + pnl / 100.0,
        quantity: 100.0,
        side: Side::Long,
        profit_loss: pnl,
        profit_loss_percent: pnl / 10_000.0,
        exit_reason: ExitReason::SignalReversal,
        fees: 0.0,
        bars_held: 5,
    }
}

fn output_with_trades(trades: Vec<Trade>, equities: &[f64]) -> RunOutput {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let equity_curve: Vec<EquityPoint> = equities
        .iter()
        .enumerate()
        .map(|(i, &equity)| EquityPoint {
            timestamp: start + Duration::days(i as i64),
            equity,
        })
        .collect();
    let final_equity = equities.last().copied().unwrap_or(0.0);
    RunOutput {
        equity_curve,
        trades,
        skipped_signals: 0,
        vetoed_entries: 0,
        skipped_bars: 0,
        warmup_bars: 0,
        final_equity,
    }
}

#[test]
fn three_trade_ledger_statistics() {
    // Wins of 800 and 500 against one 500 loss:
    // win rate 2/3, profit factor 1300/500 = 2.6.
    let trades = vec![trade(0, 800.0), trade(10, -500.0), trade(20, 500.0)];
    let equities = [100_000.0, 100_800.0, 100_300.0, 100_800.0];
    let report = PerformanceReport::compute(&output_with_trades(trades, &equities));

    assert_eq!(report.total_trades, 3);
    assert!((report.win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    assert!((report.profit_factor.unwrap() - 2.6).abs() < 1e-12);
    assert!((report.avg_win.unwrap() - 650.0).abs() < 1e-12);
    assert!((report.avg_loss.unwrap() + 500.0).abs() < 1e-12);
    assert!((report.avg_holding_bars.unwrap() - 5.0).abs() < 1e-12);
    assert_eq!(report.max_consecutive_wins, 1);
    assert_eq!(report.max_consecutive_losses, 1);
}

#[test]
fn report_computation_is_idempotent() {
    let trades = vec![trade(0, 800.0), trade(10, -500.0), trade(20, 500.0)];
    let equities = [100_000.0, 100_800.0, 100_300.0, 100_800.0];
    let output = output_with_trades(trades, &equities);

    let first = PerformanceReport::compute(&output);
    let second = PerformanceReport::compute(&output);
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn json_carries_the_contract_field_names() {
    let report = PerformanceReport::compute(&output_with_trades(
        Vec::new(),
        &[100_000.0, 101_000.0, 100_500.0],
    ));
    let json = report.to_json().unwrap();
    for field in [
        "total_return",
        "annualized_return",
        "sharpe_ratio",
        "sortino_ratio",
        "calmar_ratio",
        "omega_ratio",
        "max_drawdown",
        "ulcer_index",
        "pain_index",
        "pain_ratio",
        "profit_factor",
        "win_rate",
        "total_trades",
        "final_equity",
        "equity_curve",
        "trades_list",
    ] {
        assert!(json.contains(&format!("\"{field}\"")), "missing {field}");
    }
}

#[test]
fn end_to_end_runs_are_byte_identical() {
    let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    let bars: Vec<Bar> = (0..120)
        .map(|i| {
            // Deterministic saw-tooth around a drift so trades actually occur
            let base = 100.0 + i as f64 * 0.1;
            let wobble = ((i % 7) as f64 - 3.0) * 0.8;
            let close = base + wobble;
            Bar {
                timestamp: start + Duration::days(i as i64),
                open: close - 0.2,
                high: close + 1.0,
                low: close - 1.2,
                close,
                volume: 25_000.0,
            }
        })
        .collect();

    let mut config = RunConfig::default();
    config.strategy = StrategyConfig::MaCrossover {
        short_period: 5,
        long_period: 15,
        long_only: true,
    };
    config.risk.costs = CostConfig {
        commission: CommissionModel::Percentage { rate: 0.0005 },
        slippage_pct: 0.0005,
    };

    let a = run_single_backtest(&bars, &config).unwrap();
    let b = run_single_backtest(&bars, &config).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(
        a.report.to_json().unwrap(),
        b.report.to_json().unwrap()
    );
}
