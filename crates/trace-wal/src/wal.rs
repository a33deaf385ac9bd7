// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use trace_types::{Error, Result};

use crate::record::WalRecord;

/// Appends length-prefixed records to a single WAL file: `{u32 length,
/// bytes payload}`. Each record is `fsync`-free-but-flushed after write;
/// durability across process crashes relies on the OS page cache plus
/// the truncated-tail-discard rule on replay, matching this subsystem's
/// at-least-once, not exactly-once, guarantee.
pub struct WalWriter {
    file: File,
    path: PathBuf,
    bytes_written: u64,
}

impl WalWriter {
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(&path).await?;
        Ok(Self {
            file,
            path,
            bytes_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Appends one record; the write is surfaced to the caller so a
    /// failure here fails the triggering `push`/`cut` call.
    pub async fn append(&mut self, record: &WalRecord) -> Result<()> {
        let body = record.encode();
        let len = body.len() as u32;
        self.file.write_all(&len.to_le_bytes()).await?;
        self.file.write_all(&body).await?;
        self.file.flush().await?;
        self.bytes_written += 4 + body.len() as u64;
        Ok(())
    }

    /// Closes the file handle. The caller is responsible for renaming
    /// the path into the completing directory afterwards.
    pub async fn close(mut self) -> Result<PathBuf> {
        self.file.flush().await?;
        Ok(self.path)
    }
}

/// Replays a WAL file from disk, decoding records in order. A trailing
/// partial record (length prefix present but payload short, or length
/// prefix itself short) is discarded rather than treated as corruption:
/// that is the expected shape of a file that was being written when the
/// process stopped.
pub async fn replay(path: impl AsRef<Path>) -> Result<Vec<WalRecord>> {
    let mut file = match File::open(path.as_ref()).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    replay_bytes(&buf)
}

fn replay_bytes(buf: &[u8]) -> Result<Vec<WalRecord>> {
    let mut records = Vec::new();
    let mut cursor = 0usize;
    loop {
        if buf.len() < cursor + 4 {
            break;
        }
        let len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap()) as usize;
        let body_start = cursor + 4;
        if buf.len() < body_start + len {
            break;
        }
        let record = WalRecord::decode(&buf[body_start..body_start + len])?;
        records.push(record);
        cursor = body_start + len;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_types::{Encoding, TraceId};

    fn record(id: u8) -> WalRecord {
        WalRecord {
            trace_id: TraceId::from_bytes([id; 16]),
            payload: vec![id; 10],
            payload_encoding: Encoding::Proto,
            search_entry: Some(vec![id; 3]),
        }
    }

    #[tokio::test]
    async fn writes_and_replays_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal-file");
        let mut writer = WalWriter::create(&path).await.unwrap();
        writer.append(&record(1)).await.unwrap();
        writer.append(&record(2)).await.unwrap();
        writer.close().await.unwrap();

        let records = replay(&path).await.unwrap();
        assert_eq!(records, vec![record(1), record(2)]);
    }

    #[tokio::test]
    async fn discards_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wal-file");
        let mut writer = WalWriter::create(&path).await.unwrap();
        writer.append(&record(1)).await.unwrap();
        writer.close().await.unwrap();

        // Simulate a crash mid-write: append a length prefix with no body.
        let mut raw = tokio::fs::read(&path).await.unwrap();
        raw.extend_from_slice(&100u32.to_le_bytes());
        raw.extend_from_slice(b"short");
        tokio::fs::write(&path, raw).await.unwrap();

        let records = replay(&path).await.unwrap();
        assert_eq!(records, vec![record(1)]);
    }

    #[tokio::test]
    async fn missing_file_replays_empty() {
        let records = replay("/nonexistent/path/to/wal").await.unwrap();
        assert!(records.is_empty());
    }
}
