//! Persistence module
//!
//! Append-only trade, snapshot and behavioral logs plus the active
//! position set.

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use crate::analytics::BehavioralMetrics;
use crate::ledger::{PortfolioSnapshot, Position, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Backend refused the write
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence backend
#[async_trait]
pub trait Store: Send + Sync {
    async fn append_trade(&self, trade: &Trade) -> Result<(), StoreError>;

    async fn append_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError>;

    /// Most recent `limit` trades, oldest first
    async fn query_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, StoreError>;

    /// Snapshots taken at or after `since`, oldest first
    async fn query_snapshots(&self, since: DateTime<Utc>) -> Result<Vec<PortfolioSnapshot>, StoreError>;

    /// Active positions
    async fn get_open_positions(&self) -> Result<Vec<Position>, StoreError>;

    /// Insert or replace a position by id; inactive positions are pruned
    async fn upsert_position(&self, position: &Position) -> Result<(), StoreError>;

    async fn append_behavior(&self, metrics: &BehavioralMetrics) -> Result<(), StoreError>;

    /// Behavioral metrics recorded at or after `since`, oldest first
    async fn query_behavior(&self, since: DateTime<Utc>) -> Result<Vec<BehavioralMetrics>, StoreError>;

    /// Latest snapshot, if any
    async fn latest_snapshot(&self) -> Result<Option<PortfolioSnapshot>, StoreError> {
        Ok(self
            .query_snapshots(DateTime::<Utc>::MIN_UTC)
            .await?
            .into_iter()
            .max_by_key(|s| s.timestamp))
    }
}
