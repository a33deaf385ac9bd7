// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::path::{Path, PathBuf};

use chrono::Utc;
use trace_types::{decode_search_entry, Result, SearchEntry, SearchMetrics, SearchRequest, SearchResult, TraceId};
use uuid::Uuid;

use crate::block::{scan_search, BlockMeta};
use crate::complete_block::CompleteBlock;
use crate::index::SearchIndex;
use crate::record::WalRecord;

/// An immutable, locally-held block that is no longer appendable but has
/// not yet been indexed and streamed into its final on-disk layout. Its
/// records still live entirely in memory; its WAL file on disk is kept
/// around only so a crash before `build_complete` can recover it.
pub struct CompletingBlock {
    id: Uuid,
    records: Vec<WalRecord>,
    wal_path: PathBuf,
}

impl CompletingBlock {
    pub fn new(id: Uuid, records: Vec<WalRecord>, wal_path: PathBuf) -> Self {
        Self { id, records, wal_path }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub fn trace_count(&self) -> usize {
        self.records.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(|r| r.encode().len() + 4).sum()
    }

    pub fn find_trace_records(&self, id: &TraceId) -> Vec<WalRecord> {
        self.records.iter().filter(|r| &r.trace_id == id).cloned().collect()
    }

    pub fn search(&self, req: &SearchRequest) -> (Vec<SearchResult>, SearchMetrics) {
        scan_search(&self.records, req)
    }

    pub fn search_entries(&self) -> Vec<SearchEntry> {
        self.records
            .iter()
            .filter_map(|r| r.search_entry.as_deref())
            .filter_map(|bytes| decode_search_entry(bytes).ok())
            .collect()
    }

    /// Re-streams this block's records into a sorted, indexed, on-disk
    /// complete block under `<local_root>/complete/<id>`.
    pub async fn build_complete(&self, local_root: &Path) -> Result<CompleteBlock> {
        let dir = complete_dir(local_root, self.id);
        tokio::fs::create_dir_all(&dir).await?;

        let mut records = self.records.clone();
        records.sort_by_key(|r| *r.trace_id.as_bytes());

        let mut data = Vec::new();
        for record in &records {
            let body = record.encode();
            data.extend_from_slice(&(body.len() as u32).to_le_bytes());
            data.extend_from_slice(&body);
        }

        let entries: Vec<_> = records
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| {
                r.search_entry
                    .as_deref()
                    .and_then(|b| decode_search_entry(b).ok())
                    .map(|e| (idx, e))
            })
            .collect();
        let index = SearchIndex::build(entries.iter().map(|(idx, e)| (*idx, e)));

        let min_time_nanos = entries.iter().map(|(_, e)| e.start_nanos).min().unwrap_or(0);
        let max_time_nanos = entries.iter().map(|(_, e)| e.end_nanos).max().unwrap_or(0);
        let meta = BlockMeta {
            id: self.id,
            min_time_nanos,
            max_time_nanos,
            trace_count: records.len(),
            total_bytes: self.total_bytes(),
            created_at: Utc::now(),
        };

        tokio::fs::write(dir.join("data"), &data).await?;
        tokio::fs::write(dir.join("index.json"), serde_json::to_vec(&index)?).await?;
        tokio::fs::write(dir.join("meta.json"), serde_json::to_vec(&MetaWire::from(&meta))?).await?;

        Ok(CompleteBlock::new(meta, records, index, dir))
    }

    /// Removes the on-disk WAL file this block was sealed from. Called
    /// once the corresponding complete block exists and is durable.
    pub async fn clear_wal_file(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.wal_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn complete_dir(local_root: &Path, id: Uuid) -> PathBuf {
    local_root.join("complete").join(id.to_string())
}

/// `BlockMeta` carries a `Uuid` and a `DateTime<Utc>`, both of which
/// serialize fine on their own; this wrapper exists only because
/// `BlockMeta` itself derives no serde impls (it is shared with the
/// in-memory-only head/completing stages where persistence doesn't
/// apply).
#[derive(serde::Serialize, serde::Deserialize)]
struct MetaWire {
    id: Uuid,
    min_time_nanos: u64,
    max_time_nanos: u64,
    trace_count: usize,
    total_bytes: usize,
    created_at: chrono::DateTime<Utc>,
}

impl From<&BlockMeta> for MetaWire {
    fn from(m: &BlockMeta) -> Self {
        Self {
            id: m.id,
            min_time_nanos: m.min_time_nanos,
            max_time_nanos: m.max_time_nanos,
            trace_count: m.trace_count,
            total_bytes: m.total_bytes,
            created_at: m.created_at,
        }
    }
}
