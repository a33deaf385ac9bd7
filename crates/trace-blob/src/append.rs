// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Width, in bytes, of a staged block ID buffer before base64 encoding.
const BLOCK_ID_BUF_LEN: usize = 64;

/// Derives the base-64 block ID for the `index`-th staged block (1-based),
/// by little-endian-encoding `index` into the first 4 bytes of a
/// zero-padded 64-byte buffer. All IDs within one blob are this same
/// length, as the append-blob contract requires.
pub fn block_id_for_index(index: u32) -> String {
    let mut buf = [0u8; BLOCK_ID_BUF_LEN];
    buf[0..4].copy_from_slice(&index.to_le_bytes());
    STANDARD.encode(buf)
}

/// Opaque handle identifying the in-progress staged upload for one
/// object. The caller threads this back into each subsequent `append`
/// call; `None` on the first call starts a new staged object.
#[derive(Debug, Clone)]
pub struct AppendTracker {
    pub(crate) object_key: String,
    pub(crate) committed_block_ids: Vec<String>,
}

impl AppendTracker {
    pub(crate) fn new(object_key: String) -> Self {
        Self {
            object_key,
            committed_block_ids: Vec::new(),
        }
    }

    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn committed_blocks(&self) -> usize {
        self.committed_block_ids.len()
    }

    pub(crate) fn next_block_id(&self) -> String {
        block_id_for_index(self.committed_block_ids.len() as u32 + 1)
    }

    pub(crate) fn push(&mut self, block_id: String) {
        self.committed_block_ids.push(block_id);
    }
}
