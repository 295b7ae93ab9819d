//! Buffered persistence
//!
//! Writes that fail are kept in order and retried at the start of the next
//! flush. The ledger is never rolled back because of a storage failure.

use crate::analytics::BehavioralMetrics;
use crate::ledger::{PortfolioSnapshot, Position, Trade};
use crate::store::{Store, StoreError};
use crate::telemetry::{increment, CounterMetric};
use std::collections::VecDeque;

/// A write waiting to reach the store
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Trade(Trade),
    Snapshot(PortfolioSnapshot),
    Position(Position),
    Behavior(BehavioralMetrics),
}

impl PendingWrite {
    async fn apply<S: Store + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        match self {
            PendingWrite::Trade(trade) => store.append_trade(trade).await,
            PendingWrite::Snapshot(snapshot) => store.append_snapshot(snapshot).await,
            PendingWrite::Position(position) => store.upsert_position(position).await,
            PendingWrite::Behavior(metrics) => store.append_behavior(metrics).await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PendingWrite::Trade(_) => "trade",
            PendingWrite::Snapshot(_) => "snapshot",
            PendingWrite::Position(_) => "position",
            PendingWrite::Behavior(_) => "behavior",
        }
    }
}

/// Ordered queue of writes
#[derive(Debug)]
pub struct WriteBuffer {
    pending: VecDeque<PendingWrite>,
    capacity: usize,
}

impl WriteBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queue a write
    ///
    /// When full, the oldest non-trade write is evicted. Trades
    /// are never evicted: restore replays them, so the buffer grows past
    /// capacity rather than lose one.
    pub fn push(&mut self, write: PendingWrite) {
        if self.pending.len() >= self.capacity {
            let evictable = self
                .pending
                .iter()
                .position(|w| !matches!(w, PendingWrite::Trade(_)));
            match evictable.and_then(|i| self.pending.remove(i)) {
                Some(dropped) => {
                    tracing::error!(kind = dropped.kind(), "Write buffer full, dropping oldest write")
                }
                None => tracing::error!(
                    pending = self.pending.len(),
                    capacity = self.capacity,
                    "Write buffer full of trades, keeping all"
                ),
            }
        }
        self.pending.push_back(write);
    }

    /// Trades still waiting for the store
    pub fn pending_trades(&self) -> usize {
        self.pending
            .iter()
            .filter(|w| matches!(w, PendingWrite::Trade(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Write queued records in order, stopping at the first failure
    ///
    /// Returns the number of writes still pending.
    pub async fn flush<S: Store + ?Sized>(&mut self, store: &S) -> usize {
        while let Some(write) = self.pending.front() {
            match write.apply(store).await {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(e) => {
                    increment(CounterMetric::PersistenceFailures);
                    tracing::error!(
                        kind = write.kind(),
                        pending = self.pending.len(),
                        error = %e,
                        "Persistence failed, will retry next cycle"
                    );
                    break;
                }
            }
        }
        self.pending.len()
    }
}
