// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use async_trait::async_trait;
use trace_types::Result;

use crate::{append::AppendTracker, context::Context, keypath::KeyPath};

/// Single-object and staged-upload writes.
#[async_trait]
pub trait BlobWriter: Send + Sync {
    /// Streams `data` up as one atomic object.
    async fn write(&self, ctx: &Context, name: &str, keypath: &KeyPath, data: Vec<u8>)
        -> Result<()>;

    /// Stages `buffer` as the next block of an in-progress append, then
    /// commits the full committed+new block list atomically. Pass
    /// `tracker = None` to start a new object.
    async fn append(
        &self,
        ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        tracker: Option<AppendTracker>,
        buffer: Vec<u8>,
    ) -> Result<AppendTracker>;

    /// A no-op: each `append` call already self-commits.
    async fn close_append(&self, _tracker: AppendTracker) -> Result<()> {
        Ok(())
    }
}

/// Reads, routed through the hedged path by the caller if desired.
#[async_trait]
pub trait BlobReader: Send + Sync {
    async fn read(&self, ctx: &Context, name: &str, keypath: &KeyPath) -> Result<Vec<u8>>;

    /// Fills `dest` starting at `offset`; returns the number of bytes
    /// actually written, which is `min(dest.len(), object_size - offset)`.
    async fn read_range(
        &self,
        ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        offset: u64,
        dest: &mut [u8],
    ) -> Result<usize>;

    /// Hierarchical listing with `/` as delimiter: returns only the
    /// immediate child "directory" names under `keypath`.
    async fn list(&self, ctx: &Context, keypath: &KeyPath) -> Result<Vec<String>>;
}

/// Marker for the external compactor collaborator (blocklist build,
/// retention). Out of scope for this subsystem: the trait exists only
/// as the interface point the querier's blocklist lookups depend on.
pub trait BlobCompactor: Send + Sync {}
