//! JSON-lines file store
//!
//! `trades.jsonl`, `snapshots.jsonl` and `behavior.jsonl` are append-only,
//! one record per line. `positions.json` holds the active positions keyed
//! by id and is replaced atomically on each upsert.

use super::{Store, StoreError};
use crate::analytics::BehavioralMetrics;
use crate::ledger::{PortfolioSnapshot, Position, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

const TRADES_FILE: &str = "trades.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
const POSITIONS_FILE: &str = "positions.json";
const BEHAVIOR_FILE: &str = "behavior.jsonl";

/// File-backed store under a data directory
pub struct JsonlStore {
    dir: PathBuf,
    /// Serialises writers
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        tracing::info!(dir = %dir.display(), "Opened JSON-lines store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append_line<T: Serialize>(&self, file: &str, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))
            .await?;
        handle.write_all(&line).await?;
        handle.flush().await?;
        Ok(())
    }

    /// Read every parseable record; malformed lines are logged and skipped
    async fn read_lines<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(file);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    file = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping malformed record"
                ),
            }
        }
        Ok(records)
    }

    async fn read_positions(&self) -> Result<BTreeMap<Uuid, Position>, StoreError> {
        match fs::read_to_string(self.dir.join(POSITIONS_FILE)).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Store for JsonlStore {
    async fn append_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.append_line(TRADES_FILE, trade).await
    }

    async fn append_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), StoreError> {
        self.append_line(SNAPSHOTS_FILE, snapshot).await
    }

    async fn query_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, StoreError> {
        let mut trades: Vec<Trade> = self.read_lines(TRADES_FILE).await?;
        let start = trades.len().saturating_sub(limit);
        Ok(trades.split_off(start))
    }

    async fn query_snapshots(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PortfolioSnapshot>, StoreError> {
        let snapshots: Vec<PortfolioSnapshot> = self.read_lines(SNAPSHOTS_FILE).await?;
        Ok(snapshots
            .into_iter()
            .filter(|s| s.timestamp >= since)
            .collect())
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .read_positions()
            .await?
            .into_values()
            .filter(|p| p.is_active)
            .collect())
    }

    async fn upsert_position(&self, position: &Position) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut positions = self.read_positions().await?;
        if position.is_active {
            positions.insert(position.id, position.clone());
        } else if positions.remove(&position.id).is_none() {
            return Ok(());
        }
        positions.retain(|_, p| p.is_active);

        let tmp = self.dir.join(format!("{POSITIONS_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(&positions)?).await?;
        fs::rename(&tmp, self.dir.join(POSITIONS_FILE)).await?;
        Ok(())
    }

    async fn append_behavior(&self, metrics: &BehavioralMetrics) -> Result<(), StoreError> {
        self.append_line(BEHAVIOR_FILE, metrics).await
    }

    async fn query_behavior(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<BehavioralMetrics>, StoreError> {
        let records: Vec<BehavioralMetrics> = self.read_lines(BEHAVIOR_FILE).await?;
        Ok(records.into_iter().filter(|m| m.timestamp >= since).collect())
    }
}
