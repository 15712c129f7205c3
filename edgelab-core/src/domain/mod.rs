//! Domain types for the edgelab engine.

pub mod bar;
pub mod equity;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use equity::{equity_values, EquityPoint};
pub use position::{Position, Side};
pub use signal::{Signal, SignalDirection};
pub use trade::{ExitReason, Trade};
