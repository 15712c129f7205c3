//! Objective metric — configurable selector for sweep ranking.

use serde::{Deserialize, Serialize};

use crate::report::PerformanceReport;

/// Which report metric a sweep optimizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMetric {
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    Omega,
    AnnualizedReturn,
    TotalReturn,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
}

impl ObjectiveMetric {
    /// Pull the objective value out of a report. `None` means the metric
    /// was undefined for this run (e.g. Sharpe on a flat curve).
    pub fn extract(&self, report: &PerformanceReport) -> Option<f64> {
        match self {
            Self::Sharpe => report.sharpe_ratio,
            Self::Sortino => report.sortino_ratio,
            Self::Calmar => report.calmar_ratio,
            Self::Omega => report.omega_ratio,
            Self::AnnualizedReturn => report.annualized_return,
            Self::TotalReturn => Some(report.total_return),
            Self::WinRate => report.win_rate,
            Self::ProfitFactor => report.profit_factor,
            Self::MaxDrawdown => Some(report.max_drawdown),
        }
    }

    /// True when `a` beats `b`. A defined value always beats an undefined
    /// one; two undefined values tie.
    ///
    /// Higher wins for every metric. MaxDrawdown is stored as a negative
    /// fraction, so "higher" (closer to zero) is still the better run.
    pub fn is_better(&self, a: Option<f64>, b: Option<f64>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgelab_core::engine::RunOutput;

    fn sample_report() -> PerformanceReport {
        let mut report = PerformanceReport::compute(&RunOutput {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            skipped_signals: 0,
            vetoed_entries: 0,
            skipped_bars: 0,
            warmup_bars: 0,
            final_equity: 0.0,
        });
        report.sharpe_ratio = Some(1.5);
        report.sortino_ratio = Some(2.0);
        report.calmar_ratio = Some(1.2);
        report.total_return = 0.15;
        report.max_drawdown = -0.10;
        report.win_rate = Some(0.55);
        report.profit_factor = Some(1.8);
        report
    }

    #[test]
    fn extract_sharpe() {
        let r = sample_report();
        assert_eq!(ObjectiveMetric::Sharpe.extract(&r), Some(1.5));
    }

    #[test]
    fn extract_max_drawdown_is_always_defined() {
        let r = sample_report();
        assert_eq!(ObjectiveMetric::MaxDrawdown.extract(&r), Some(-0.10));
    }

    #[test]
    fn default_is_sharpe() {
        assert_eq!(ObjectiveMetric::default(), ObjectiveMetric::Sharpe);
    }

    #[test]
    fn is_better_plain_comparison() {
        assert!(ObjectiveMetric::Sharpe.is_better(Some(2.0), Some(1.5)));
        assert!(!ObjectiveMetric::Sharpe.is_better(Some(1.0), Some(1.5)));
    }

    #[test]
    fn is_better_max_drawdown() {
        // -0.05 beats -0.20 (shallower drawdown)
        assert!(ObjectiveMetric::MaxDrawdown.is_better(Some(-0.05), Some(-0.20)));
        assert!(!ObjectiveMetric::MaxDrawdown.is_better(Some(-0.20), Some(-0.05)));
    }

    #[test]
    fn defined_beats_undefined() {
        assert!(ObjectiveMetric::Sharpe.is_better(Some(-3.0), None));
        assert!(!ObjectiveMetric::Sharpe.is_better(None, Some(-3.0)));
        assert!(!ObjectiveMetric::Sharpe.is_better(None, None));
    }

    #[test]
    fn objective_roundtrips_snake_case() {
        let json = serde_json::to_string(&ObjectiveMetric::ProfitFactor).unwrap();
        assert_eq!(json, "\"profit_factor\"");
        let deser: ObjectiveMetric = serde_json::from_str(&json).unwrap();
        assert_eq!(deser, ObjectiveMetric::ProfitFactor);
    }
}
