// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use trace_types::{Encoding, Error, Result, SearchEntry, SearchRequest, TraceId};
use uuid::Uuid;

use crate::block::scan_search;
use crate::completing_block::CompletingBlock;
use crate::record::WalRecord;
use crate::wal::{self, WalWriter};

/// The currently-appendable block, backed by a WAL file at
/// `<local>/wal/<uuid>`. Receives one record per trace as it is cut
/// from the live buffer (not one record per push).
///
/// Held behind `Arc` so a search in flight can keep reading `records`
/// after the instance has sealed this block and moved on to a new
/// head; `seal` therefore takes `&self` and tears down the writer
/// through the interior `Option`, rather than consuming the block.
pub struct HeadBlock {
    id: Uuid,
    writer: AsyncMutex<Option<WalWriter>>,
    created_at: Instant,
    records: parking_lot::RwLock<Vec<WalRecord>>,
}

impl HeadBlock {
    pub async fn create(local_root: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let path = wal_path(local_root, id);
        let writer = WalWriter::create(path).await?;
        Ok(Self {
            id,
            writer: AsyncMutex::new(Some(writer)),
            created_at: Instant::now(),
            records: parking_lot::RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn bytes(&self) -> u64 {
        // Locking here is instantaneous in practice (no await while held);
        // `try_lock` would require a sync flavor of the writer, which the
        // cut-readiness check does not need.
        self.records.read().iter().map(|r| r.encode().len() as u64 + 4).sum()
    }

    pub fn trace_count(&self) -> usize {
        self.records.read().len()
    }

    /// Appends one cut trace as a single WAL record.
    pub async fn append(
        &self,
        trace_id: TraceId,
        payload: Vec<u8>,
        payload_encoding: Encoding,
        search_entry: Option<Vec<u8>>,
    ) -> Result<()> {
        let record = WalRecord {
            trace_id,
            payload,
            payload_encoding,
            search_entry,
        };
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| Error::Fatal("head block already sealed".into()))?;
        writer.append(&record).await?;
        drop(guard);
        self.records.write().push(record);
        Ok(())
    }

    pub fn search_entries(&self) -> Vec<SearchEntry> {
        self.records
            .read()
            .iter()
            .filter_map(|r| r.search_entry.as_deref())
            .filter_map(|bytes| trace_types::decode_search_entry(bytes).ok())
            .collect()
    }

    pub fn search(&self, req: &SearchRequest) -> (Vec<trace_types::SearchResult>, trace_types::SearchMetrics) {
        scan_search(&self.records.read(), req)
    }

    pub fn find_trace_records(&self, id: &TraceId) -> Vec<WalRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| &r.trace_id == id)
            .cloned()
            .collect()
    }

    /// Seals this head block: closes the WAL writer and renames its
    /// file into the completing directory. The in-memory records are
    /// cloned into the resulting `CompletingBlock`; any reader still
    /// holding an `Arc` to this (now write-dead) head block keeps a
    /// valid, if now-stale, view of the same records.
    pub async fn seal(&self, local_root: &Path) -> Result<CompletingBlock> {
        let mut guard = self.writer.lock().await;
        let writer = guard.take().ok_or_else(|| Error::Fatal("head block already sealed".into()))?;
        let wal_path = writer.close().await?;
        drop(guard);

        let dest = completing_path(local_root, self.id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&wal_path, &dest).await?;
        Ok(CompletingBlock::new(self.id, self.records.read().clone(), dest))
    }
}

pub fn wal_path(local_root: &Path, id: Uuid) -> PathBuf {
    local_root.join("wal").join(id.to_string())
}

pub fn completing_path(local_root: &Path, id: Uuid) -> PathBuf {
    local_root.join("completing").join(id.to_string())
}

/// Recovery: re-opens a head-state WAL file left behind by a prior
/// process and replays it as a completing block seed, per the WAL
/// recovery contract in §4.3.
pub async fn recover_as_completing(local_root: &Path, id: Uuid) -> Result<CompletingBlock> {
    let path = wal_path(local_root, id);
    let records = wal::replay(&path).await?;
    let dest = completing_path(local_root, id);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(&path, &dest).await?;
    Ok(CompletingBlock::new(id, records, dest))
}
