//! Exit plan module
//!
//! Stop-loss, take-profit and invalidation checks that force a close
//! regardless of what the oracle says.

mod conditions;
mod market_state;
mod monitor;

pub use conditions::InvalidationCondition;
pub use market_state::{MarketFlags, MarketStateEvaluator, VOLATILITY_SPIKE, VOLUME_SPIKE};
pub use monitor::{evaluate, ExitMonitor, ExitSignal};
