// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use async_trait::async_trait;
use trace_types::Result;
use trace_wal::{BlockMeta, FlushHandle};

/// The object-storage collaborator an instance hands completed blocks
/// to. Modeled as a trait so tests can supply an in-memory double
/// without depending on a concrete blob backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn write_block(&self, tenant: &str, meta: &BlockMeta, handle: &FlushHandle) -> Result<()>;
}
