// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use async_trait::async_trait;

use trace_blob::{BlobWriter, Context, KeyPath, LocalBlob};
use trace_types::Result;
use trace_wal::{BlockMeta, FlushHandle};

/// Adapts the bundled [`LocalBlob`] backend to the ingester's `Store`
/// collaborator: each flush writes `data`, `index`, and `meta` under
/// `tenant/<tenant>/<block_uuid>/`, matching the object store layout.
pub struct LocalStore {
    blob: LocalBlob,
}

impl LocalStore {
    pub fn new(blob: LocalBlob) -> Self {
        Self { blob }
    }
}

#[async_trait]
impl trace_ingester::Store for LocalStore {
    async fn write_block(&self, tenant: &str, meta: &BlockMeta, handle: &FlushHandle) -> Result<()> {
        let keypath = KeyPath::new(["tenant", tenant, &meta.id.to_string()]);
        let ctx = Context::new();
        self.blob.write(&ctx, "data", &keypath, handle.data.clone()).await?;
        self.blob.write(&ctx, "index", &keypath, handle.index.clone()).await?;
        self.blob.write(&ctx, "meta", &keypath, handle.meta.clone()).await?;
        Ok(())
    }
}
