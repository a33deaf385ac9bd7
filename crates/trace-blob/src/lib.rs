// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
//! Object-storage abstraction used by the ingester to flush complete
//! blocks and by the querier to read them back: a primary handle for
//! writes/listing, and a hedged handle for tail-latency-sensitive reads.

mod append;
mod context;
mod hedged;
mod keypath;
mod local;
mod mem;
mod traits;

pub use append::{block_id_for_index, AppendTracker};
pub use context::Context;
pub use hedged::HedgedReader;
pub use keypath::{object_file_name, KeyPath};
pub use local::{ensure_dir, LocalBlob};
pub use mem::MemBlob;
pub use traits::{BlobCompactor, BlobReader, BlobWriter};

pub use trace_types::{Error, Result};
