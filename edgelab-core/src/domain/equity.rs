//! EquityPoint — one mark-to-market observation per bar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single point in the equity curve: cash + mark-to-market position value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Extract the raw equity values from a curve.
pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}
