//! Decision oracle module
//!
//! The external advisor that proposes a decision each cycle. Replies are
//! raw text; validation happens at the decision schema boundary.

mod context;
mod http;

pub use context::OracleContext;
pub use http::{HttpOracle, OracleConfig};

use async_trait::async_trait;

/// Source of trading decisions
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Ask for a decision given the current context
    async fn decide(&self, context: &OracleContext) -> anyhow::Result<String>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Oracle that always holds
#[derive(Debug, Clone, Default)]
pub struct HoldOracle;

#[async_trait]
impl DecisionOracle for HoldOracle {
    async fn decide(&self, _context: &OracleContext) -> anyhow::Result<String> {
        Ok(r#"{"action":"hold","direction":"none","justification":"no oracle configured"}"#
            .to_string())
    }

    fn name(&self) -> &str {
        "hold"
    }
}
