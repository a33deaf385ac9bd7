// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use trace_types::{combine_trace_bytes, decode_fragment, Encoding, Error, ReconstructedTrace, Result, SearchMetrics, SearchRequest, SearchResult, TraceId};
use trace_wal::{head_block, CompleteBlock, CompletingBlock, FlushHandle, HeadBlock};

use crate::buffer::TraceBuffer;
use crate::limiter::Limiter;
use crate::store::Store;

struct CompleteEntry {
    block: Arc<CompleteBlock>,
    flushed: bool,
    completed_at: Instant,
}

struct InstanceState {
    buffer: TraceBuffer,
    head: Arc<HeadBlock>,
    completing: Vec<Arc<CompletingBlock>>,
    complete: Vec<CompleteEntry>,
}

/// All per-tenant ingest state on one ingester: the live trace buffer,
/// the current head block, the completing blocks awaiting indexing,
/// and the complete blocks awaiting flush.
pub struct Instance {
    tenant: String,
    local_root: PathBuf,
    limiter: Arc<dyn Limiter>,
    store: Arc<dyn Store>,
    state: AsyncRwLock<InstanceState>,
}

impl Instance {
    /// Opens (or creates) the instance's local directory and recovers
    /// any WAL files a prior process left behind: head-state files
    /// become completing block seeds, completing-state files are
    /// re-registered as completing blocks. Complete blocks are not
    /// recovered from local disk -- the flush loop discovers them by
    /// listing the object store.
    pub async fn open(tenant: String, local_root: PathBuf, limiter: Arc<dyn Limiter>, store: Arc<dyn Store>) -> Result<Self> {
        tokio::fs::create_dir_all(local_root.join("wal")).await?;
        tokio::fs::create_dir_all(local_root.join("completing")).await?;
        tokio::fs::create_dir_all(local_root.join("complete")).await?;

        let mut completing = Vec::new();

        // Scan `completing/` first: `recover_as_completing` below renames
        // `wal/<id>` into this same directory, so scanning it first (before
        // any such rename lands new files in it) ensures each leftover
        // block is registered exactly once.
        let mut completing_dir = tokio::fs::read_dir(local_root.join("completing")).await?;
        while let Some(entry) = completing_dir.next_entry().await? {
            let Ok(id) = Uuid::parse_str(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            let path = entry.path();
            let records = trace_wal::wal::replay(&path).await?;
            info!(tenant, block_id = %id, records = records.len(), "recovered completing block");
            completing.push(Arc::new(CompletingBlock::new(id, records, path)));
        }

        let mut wal_dir = tokio::fs::read_dir(local_root.join("wal")).await?;
        while let Some(entry) = wal_dir.next_entry().await? {
            let Ok(id) = Uuid::parse_str(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            warn!(tenant, block_id = %id, "recovering head-state WAL file as completing block");
            let block = head_block::recover_as_completing(&local_root, id).await?;
            completing.push(Arc::new(block));
        }

        let head = Arc::new(HeadBlock::create(&local_root).await?);

        Ok(Self {
            tenant,
            local_root,
            limiter,
            store,
            state: AsyncRwLock::new(InstanceState {
                buffer: TraceBuffer::new(),
                head,
                completing,
                complete: Vec::new(),
            }),
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub async fn push_bytes(
        &self,
        trace_id: TraceId,
        payload: Vec<u8>,
        payload_encoding: Encoding,
        search_entry: Option<Vec<u8>>,
    ) -> Result<()> {
        self.limiter.check_rate()?;
        let mut state = self.state.write().await;
        state.buffer.push(trace_id, payload, payload_encoding, search_entry, self.limiter.as_ref())
    }

    /// Moves every idle (or, if `immediate`, every) live trace into the
    /// head block's WAL, one record per trace.
    pub async fn cut_complete_traces(&self, max_idle: Duration, immediate: bool) -> Result<usize> {
        let mut state = self.state.write().await;
        let cut = state.buffer.cut_eligible(max_idle, immediate);
        let count = cut.len();
        for trace in cut {
            state
                .head
                .append(
                    trace.trace_id(),
                    trace.payload().to_vec(),
                    trace.payload_encoding(),
                    trace.search_entry().map(|b| b.to_vec()),
                )
                .await?;
        }
        if count > 0 {
            debug!(tenant = %self.tenant, count, "cut traces into head block");
        }
        Ok(count)
    }

    /// Seals the head block into a completing block and starts a fresh
    /// head, iff it has grown past `max_block_bytes`, aged past
    /// `max_block_age`, or `immediate` is set. Returns the sealed
    /// block's ID.
    pub async fn cut_block_if_ready(&self, max_block_age: Duration, max_block_bytes: u64, immediate: bool) -> Result<Option<Uuid>> {
        let mut state = self.state.write().await;
        let ready = immediate || state.head.bytes() >= max_block_bytes || state.head.age() >= max_block_age;
        if !ready {
            return Ok(None);
        }

        let sealed = state.head.seal(&self.local_root).await?;
        let id = sealed.id();
        state.completing.push(Arc::new(sealed));
        state.head = Arc::new(HeadBlock::create(&self.local_root).await?);
        info!(tenant = %self.tenant, block_id = %id, "sealed head block into completing");
        Ok(Some(id))
    }

    /// Builds an indexed, on-disk complete block from a completing
    /// block. The completing block is left in place; call
    /// `clear_completing_block` once callers no longer need it.
    pub async fn complete_block(&self, id: Uuid) -> Result<()> {
        let completing = {
            let state = self.state.read().await;
            state.completing.iter().find(|c| c.id() == id).cloned()
        };
        let Some(completing) = completing else {
            return Err(Error::NotFound);
        };
        let complete = completing.build_complete(&self.local_root).await?;
        info!(tenant = %self.tenant, block_id = %id, "built complete block");

        let mut state = self.state.write().await;
        state.complete.push(CompleteEntry {
            block: Arc::new(complete),
            flushed: false,
            completed_at: Instant::now(),
        });
        Ok(())
    }

    /// Removes a completing block's on-disk files, provided no search
    /// is still holding a reference to it. Returns `false` without
    /// error if the block is still in use; the caller should retry.
    pub async fn clear_completing_block(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let pos = state.completing.iter().position(|c| c.id() == id).ok_or(Error::NotFound)?;
        if Arc::strong_count(&state.completing[pos]) > 1 {
            return Ok(false);
        }
        let completing = state.completing.remove(pos);
        drop(state);
        completing.clear_wal_file().await?;
        Ok(true)
    }

    /// Returns the persisted data/index/meta bytes for a complete
    /// block, suitable for `store.write_block`.
    pub async fn block_to_be_flushed(&self, id: Uuid) -> Result<FlushHandle> {
        let block = {
            let state = self.state.read().await;
            state.complete.iter().find(|e| e.block.id() == id).map(|e| e.block.clone())
        };
        let block = block.ok_or(Error::NotFound)?;
        block.flush_handle().await
    }

    /// Reads a complete block's flush handle, uploads it via the
    /// injected store, and marks the block flushed on success.
    pub async fn flush_block(&self, id: Uuid) -> Result<()> {
        let block = {
            let state = self.state.read().await;
            state.complete.iter().find(|e| e.block.id() == id).map(|e| e.block.clone())
        };
        let block = block.ok_or(Error::NotFound)?;
        let handle = block.flush_handle().await?;
        self.store.write_block(&self.tenant, block.meta(), &handle).await?;

        let mut state = self.state.write().await;
        if let Some(entry) = state.complete.iter_mut().find(|e| e.block.id() == id) {
            entry.flushed = true;
        }
        info!(tenant = %self.tenant, block_id = %id, "flushed complete block to store");
        Ok(())
    }

    /// Removes complete blocks that have been flushed and are at least
    /// `min_age` past completion, provided no search is still holding a
    /// reference. Returns the number actually cleared.
    pub async fn clear_flushed_blocks(&self, min_age: Duration) -> Result<usize> {
        let now = Instant::now();
        let mut to_clear = Vec::new();
        {
            let mut state = self.state.write().await;
            let mut keep = Vec::with_capacity(state.complete.len());
            for entry in state.complete.drain(..) {
                let eligible = entry.flushed && now.saturating_duration_since(entry.completed_at) >= min_age;
                if eligible && Arc::strong_count(&entry.block) == 1 {
                    to_clear.push(entry.block);
                } else {
                    keep.push(entry);
                }
            }
            state.complete = keep;
        }
        let cleared = to_clear.len();
        for block in to_clear {
            block.clear().await?;
        }
        Ok(cleared)
    }

    /// An exhaustive union of the in-buffer payload and every matching
    /// block-stage record, combined with `combine_trace_protos` so
    /// duplicate spans collapse regardless of which stage saw them.
    pub async fn find_trace_by_id(&self, id: &TraceId) -> Result<Option<ReconstructedTrace>> {
        let (buffer_hit, head, completing, complete) = {
            let state = self.state.read().await;
            (
                state.buffer.find_trace(id).map(|(bytes, enc)| (bytes.to_vec(), enc)),
                state.head.clone(),
                state.completing.clone(),
                state.complete.iter().map(|e| e.block.clone()).collect::<Vec<_>>(),
            )
        };

        let mut records = head.find_trace_records(id);
        for c in &completing {
            records.extend(c.find_trace_records(id));
        }
        for c in &complete {
            records.extend(c.find_trace_records(id));
        }

        let mut acc = buffer_hit;
        for record in records {
            acc = Some(match acc {
                None => (record.payload, record.payload_encoding),
                Some((bytes, enc)) => combine_trace_bytes(&bytes, enc, &record.payload, record.payload_encoding)?,
            });
        }

        match acc {
            None => Ok(None),
            Some((bytes, enc)) => Ok(Some(ReconstructedTrace {
                trace_id: *id,
                fragment: decode_fragment(&bytes, enc)?,
            })),
        }
    }

    /// Searches live buffer, head block, completing blocks, and
    /// complete blocks in that order, merging by trace ID (first
    /// occurrence wins) and accumulating metrics across every stage
    /// visited. The live buffer and head block together count as a
    /// single inspected block, since they represent one logical
    /// (mutable) stage.
    pub async fn search(&self, req: &SearchRequest) -> (Vec<SearchResult>, SearchMetrics) {
        let (buf_results, buf_metrics, head, completing, complete) = {
            let state = self.state.read().await;
            let (buf_results, buf_metrics) = state.buffer.search(req);
            (
                buf_results,
                buf_metrics,
                state.head.clone(),
                state.completing.clone(),
                state.complete.iter().map(|e| e.block.clone()).collect::<Vec<_>>(),
            )
        };

        let mut merged = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut metrics = SearchMetrics::default();

        let (head_results, head_metrics) = head.search(req);
        metrics.merge(&buf_metrics);
        metrics.merge(&head_metrics);
        metrics.inspected_blocks += 1;
        for r in buf_results.into_iter().chain(head_results) {
            if seen.insert(r.trace_id) {
                merged.push(r);
            }
        }

        for c in &completing {
            let (results, m) = c.search(req);
            metrics.merge(&m);
            metrics.inspected_blocks += 1;
            for r in results {
                if seen.insert(r.trace_id) {
                    merged.push(r);
                }
            }
        }

        for c in &complete {
            let (results, m) = c.search(req);
            metrics.merge(&m);
            metrics.inspected_blocks += 1;
            for r in results {
                if seen.insert(r.trace_id) {
                    merged.push(r);
                }
            }
        }

        (merged, metrics)
    }

    pub async fn search_tags(&self) -> Vec<String> {
        let (buffer_entries, head_entries, completing_entries, complete_blocks) = {
            let state = self.state.read().await;
            (
                state.buffer.search_entries(),
                state.head.search_entries(),
                state.completing.iter().map(|c| c.search_entries()).collect::<Vec<_>>(),
                state.complete.iter().map(|e| e.block.clone()).collect::<Vec<_>>(),
            )
        };

        let mut names = BTreeSet::new();
        for entry in buffer_entries.iter().chain(head_entries.iter()).chain(completing_entries.iter().flatten()) {
            for (key, _) in &entry.tags {
                names.insert(key.clone());
            }
        }
        for block in &complete_blocks {
            for name in block.index().tag_names() {
                names.insert(name);
            }
        }
        names.into_iter().collect()
    }

    pub async fn search_tag_values(&self, key: &str) -> Vec<String> {
        let (buffer_entries, head_entries, completing_entries, complete_blocks) = {
            let state = self.state.read().await;
            (
                state.buffer.search_entries(),
                state.head.search_entries(),
                state.completing.iter().map(|c| c.search_entries()).collect::<Vec<_>>(),
                state.complete.iter().map(|e| e.block.clone()).collect::<Vec<_>>(),
            )
        };

        let mut values = BTreeSet::new();
        for entry in buffer_entries.iter().chain(head_entries.iter()).chain(completing_entries.iter().flatten()) {
            for (tag_key, tag_value) in &entry.tags {
                if tag_key == key {
                    values.insert(tag_value.clone());
                }
            }
        }
        for block in &complete_blocks {
            for value in block.index().tag_values(key) {
                values.insert(value);
            }
        }
        values.into_iter().collect()
    }

    /// Runs the §6 exit-behavior cut sequence: seals the WAL tail so a
    /// graceful stop never loses an in-flight trace. Does not wait for
    /// completion or flush.
    pub async fn shutdown(&self) -> Result<()> {
        self.cut_complete_traces(Duration::ZERO, true).await?;
        self.cut_block_if_ready(Duration::ZERO, 0, true).await?;
        Ok(())
    }
}
