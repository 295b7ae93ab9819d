//! Analytics module
//!
//! Risk metrics and behavioral statistics recomputed every cycle

mod behavior;
mod report;
mod risk;

pub use behavior::{BehavioralMetrics, FEE_IMPACT_CAP};
pub use report::PerformanceReport;
pub use risk::{max_drawdown, DrawdownTracker, RiskMetrics, RiskMetricsEngine};
