//! Decision module
//!
//! Oracle recommendations and the schema boundary that validates them

mod parse;
mod types;

pub use parse::{decision_from_value, parse_decision, MalformedDecision};
pub use types::{Action, Decision, Direction, ExitPlan, RiskAssessment};
