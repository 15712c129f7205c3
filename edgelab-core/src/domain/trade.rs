//! Trade — an immutable closed-position record in the append-only ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Side;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SignalReversal,
    EndOfPeriod,
}

/// A completed round-trip trade.
///
/// Field names match the report wire contract (`trades_list` entries),
/// so the ledger serializes directly into the performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub side: Side,
    /// Net P&L after commissions and slippage, in account currency.
    pub profit_loss: f64,
    /// Net P&L as a fraction of entry cost (quantity × entry price).
    pub profit_loss_percent: f64,
    pub exit_reason: ExitReason,
    /// Total commission paid on entry + exit.
    pub fees: f64,
    pub bars_held: usize,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit_loss > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trade_serialization_uses_contract_field_names() {
        let t = Trade {
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap(),
            entry_price: 100.0,
            exit_price: 110.0,
            quantity: 50.0,
            side: Side::Long,
            profit_loss: 485.0,
            profit_loss_percent: 0.097,
            exit_reason: ExitReason::TakeProfit,
            fees: 10.0,
            bars_held: 5,
        };
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("profit_loss").is_some());
        assert!(json.get("profit_loss_percent").is_some());
        assert_eq!(json["exit_reason"], "take_profit");
        assert_eq!(json["side"], "long");
    }
}
