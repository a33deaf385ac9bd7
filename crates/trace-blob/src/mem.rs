// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use trace_types::{Error, Result};

use crate::{
    append::AppendTracker,
    context::Context,
    keypath::{object_file_name, KeyPath},
    traits::{BlobReader, BlobWriter},
};

/// In-memory blob backend: grounds the unit tests and the single-node
/// demo. Staged blocks live in a side map until committed so `append`
/// can re-derive the concatenated object on every call.
#[derive(Debug, Default)]
pub struct MemBlob {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    staged: RwLock<BTreeMap<String, Vec<Vec<u8>>>>,
}

impl MemBlob {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobWriter for MemBlob {
    async fn write(&self, _ctx: &Context, name: &str, keypath: &KeyPath, data: Vec<u8>) -> Result<()> {
        let key = object_file_name(keypath, name);
        self.objects.write().insert(key, data);
        Ok(())
    }

    async fn append(
        &self,
        _ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        tracker: Option<AppendTracker>,
        buffer: Vec<u8>,
    ) -> Result<AppendTracker> {
        let key = object_file_name(keypath, name);
        let mut tracker = tracker.unwrap_or_else(|| AppendTracker::new(key.clone()));
        if tracker.object_key() != key {
            return Err(Error::InvalidInput(
                "append tracker does not match target object".into(),
            ));
        }
        let block_id = tracker.next_block_id();
        tracker.push(block_id);

        let mut staged = self.staged.write();
        let blocks = staged.entry(key.clone()).or_default();
        blocks.push(buffer);

        let committed: Vec<u8> = blocks.iter().flatten().copied().collect();
        drop(staged);

        self.objects.write().insert(key, committed);
        Ok(tracker)
    }
}

#[async_trait]
impl BlobReader for MemBlob {
    async fn read(&self, _ctx: &Context, name: &str, keypath: &KeyPath) -> Result<Vec<u8>> {
        let key = object_file_name(keypath, name);
        self.objects.read().get(&key).cloned().ok_or(Error::NotFound)
    }

    async fn read_range(
        &self,
        _ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        offset: u64,
        dest: &mut [u8],
    ) -> Result<usize> {
        let key = object_file_name(keypath, name);
        let objects = self.objects.read();
        let data = objects.get(&key).ok_or(Error::NotFound)?;
        let offset = offset as usize;
        if offset > data.len() {
            return Ok(0);
        }
        let n = dest.len().min(data.len() - offset);
        dest[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    async fn list(&self, _ctx: &Context, keypath: &KeyPath) -> Result<Vec<String>> {
        let prefix = keypath.as_prefix();
        let objects = self.objects.read();
        let mut children = std::collections::BTreeSet::new();
        for key in objects.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if let Some(segment) = rest.split('/').next() {
                    if !segment.is_empty() {
                        children.insert(segment.to_string());
                    }
                }
            }
        }
        Ok(children.into_iter().collect())
    }
}
