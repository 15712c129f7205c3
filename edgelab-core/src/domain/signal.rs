//! Signal — a strategy's per-bar entry/exit intent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction a strategy wants to be positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Long,
    Short,
    Flat,
}

/// A signal emitted by a strategy — at most one per bar.
///
/// Created by the strategy, consumed by the position sizer. `strength` is
/// optional strategy-defined confidence in [0, 1]; the engine does not
/// interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub direction: SignalDirection,
    pub strength: Option<f64>,
}

impl Signal {
    pub fn new(timestamp: DateTime<Utc>, direction: SignalDirection) -> Self {
        Self {
            timestamp,
            direction,
            strength: None,
        }
    }
}
