//! Ledger module
//!
//! Simulated perpetuals account: cash, leveraged positions, the trade log
//! and portfolio snapshots

mod book;
mod position;
mod snapshot;
mod trade;
mod types;

pub use book::{Ledger, LedgerConfig};
pub use position::Position;
pub use snapshot::PortfolioSnapshot;
pub use trade::Trade;
pub use types::{CloseReason, LedgerError, OrderSide, Side, TradeKind};
