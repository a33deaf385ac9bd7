// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use trace_types::{Error, Result};

use crate::{
    append::AppendTracker,
    context::Context,
    keypath::{object_file_name, KeyPath},
    traits::{BlobReader, BlobWriter},
};

/// Filesystem-backed blob store laid out exactly like the object-store
/// key scheme (`root/tenant/<id>/<uuid>/{data,index,meta}`). The default
/// backend for the bundled binary; a production deployment would plug
/// an S3-compatible backend in behind the same [`BlobReader`]/
/// [`BlobWriter`] traits.
#[derive(Debug, Clone)]
pub struct LocalBlob {
    root: PathBuf,
    staged: Arc<Mutex<BTreeMap<String, Vec<Vec<u8>>>>>,
}

impl LocalBlob {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staged: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn path_for(&self, keypath: &KeyPath, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in keypath.segments() {
            path.push(segment);
        }
        path.push(name);
        path
    }

    fn dir_for(&self, keypath: &KeyPath) -> PathBuf {
        let mut path = self.root.clone();
        for segment in keypath.segments() {
            path.push(segment);
        }
        path
    }
}

fn map_io_err(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl BlobWriter for LocalBlob {
    async fn write(&self, _ctx: &Context, name: &str, keypath: &KeyPath, data: Vec<u8>) -> Result<()> {
        let path = self.path_for(keypath, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(map_io_err)?;
        }
        tokio::fs::write(&path, data).await.map_err(map_io_err)
    }

    async fn append(
        &self,
        ctx: &Context,
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

        let committed = {
            let mut staged = self.staged.lock();
            let blocks = staged.entry(key.clone()).or_default();
            blocks.push(buffer);
            blocks.concat()
        };

        self.write(ctx, name, keypath, committed).await?;
        Ok(tracker)
    }
}

#[async_trait]
impl BlobReader for LocalBlob {
    async fn read(&self, _ctx: &Context, name: &str, keypath: &KeyPath) -> Result<Vec<u8>> {
        let path = self.path_for(keypath, name);
        tokio::fs::read(&path).await.map_err(map_io_err)
    }

    async fn read_range(
        &self,
        _ctx: &Context,
        name: &str,
        keypath: &KeyPath,
        offset: u64,
        dest: &mut [u8],
    ) -> Result<usize> {
        let path = self.path_for(keypath, name);
        let mut file = tokio::fs::File::open(&path).await.map_err(map_io_err)?;
        let len = file.metadata().await.map_err(map_io_err)?.len();
        if offset >= len {
            return Ok(0);
        }
        file.seek(std::io::SeekFrom::Start(offset)).await.map_err(map_io_err)?;
        let want = dest.len().min((len - offset) as usize);
        file.read_exact(&mut dest[..want]).await.map_err(map_io_err)?;
        Ok(want)
    }

    async fn list(&self, _ctx: &Context, keypath: &KeyPath) -> Result<Vec<String>> {
        let dir = self.dir_for(keypath);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(map_io_err)? {
            if entry.file_type().await.map_err(map_io_err)?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Ensures the directory tree for a keypath exists, used by `trace-wal`
/// when laying out per-block local directories.
pub async fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(map_io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlob::new(dir.path());
        let ctx = Context::new();
        let kp = KeyPath::new(["tenant", "t1"]);
        blob.write(&ctx, "meta", &kp, b"hello".to_vec()).await.unwrap();
        assert_eq!(blob.read(&ctx, "meta", &kp).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlob::new(dir.path());
        let ctx = Context::new();
        let err = blob.read(&ctx, "meta", &KeyPath::new(["nope"])).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn append_commits_concatenation() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlob::new(dir.path());
        let ctx = Context::new();
        let kp = KeyPath::new(["tenant", "t1", "block"]);

        let t1 = blob.append(&ctx, "data", &kp, None, b"one-".to_vec()).await.unwrap();
        let t2 = blob.append(&ctx, "data", &kp, Some(t1), b"two-".to_vec()).await.unwrap();
        let _t3 = blob.append(&ctx, "data", &kp, Some(t2), b"three".to_vec()).await.unwrap();

        assert_eq!(blob.read(&ctx, "data", &kp).await.unwrap(), b"one-two-three");
    }

    #[tokio::test]
    async fn list_yields_tenant_then_block_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlob::new(dir.path());
        let ctx = Context::new();
        blob.write(&ctx, "data", &KeyPath::new(["tenant", "t1", "b1"]), vec![1])
            .await
            .unwrap();

        let tenants = blob.list(&ctx, &KeyPath::new(["tenant"])).await.unwrap();
        assert_eq!(tenants, vec!["t1".to_string()]);
        let blocks = blob.list(&ctx, &KeyPath::new(["tenant", "t1"])).await.unwrap();
        assert_eq!(blocks, vec!["b1".to_string()]);
    }
}
