//! Risk management module
//!
//! Decision validation, fee and margin arithmetic

mod fees;
mod policy;
mod types;

pub use fees::{margin, notional, FeeModel};
pub use policy::{PortfolioState, RiskLimits, RiskPolicy};
pub use types::{Adjustment, Intent, Rejection, ValidatedDecision};
