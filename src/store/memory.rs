//! In-memory store

use super::{Store, StoreError};
use crate::analytics::BehavioralMetrics;
use crate::ledger::{PortfolioSnapshot, Position, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    trades: Vec<Trade>,
    snapshots: Vec<PortfolioSnapshot>,
    positions: BTreeMap<Uuid, Position>,
    behavior: Vec<BehavioralMetrics>,
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn trade_count(&self) -> usize {
        self.inner.read().await.trades.len()
    }

    pub async fn snapshot_count(&self) -> usize {
        self.inner.read().await.snapshots.len()
    }

    pub async fn behavior_count(&self) -> usize {
        self.inner.read().await.behavior.len()
    }

    /// Positions held, active or not
    pub async fn position_count(&self) -> usize {
        self.inner.read().await.positions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.inner.write().await.trades.push(trade.clone());
        Ok(())
    }

    async fn append_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        self.inner.write().await.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn query_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        let inner = self.inner.read().await;
        let start = inner.trades.len().saturating_sub(limit);
        Ok(inner.trades[start..].to_vec())
    }

    async fn query_snapshots(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .positions
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn upsert_position(&self, position: &Position) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if position.is_active {
            inner.positions.insert(position.id, position.clone());
        } else {
            inner.positions.remove(&position.id);
        }
        Ok(())
    }

    async fn append_behavior(&self, metrics: &BehavioralMetrics) -> Result<(), StoreError> {
        self.inner.write().await.behavior.push(metrics.clone());
        Ok(())
    }

    async fn query_behavior(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<BehavioralMetrics>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .behavior
            .iter()
            .filter(|m| m.timestamp >= since)
            .cloned()
            .collect())
    }
}
