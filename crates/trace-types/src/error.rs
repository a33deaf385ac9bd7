// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use thiserror::Error;

/// Error kinds shared across the write and read paths.
///
/// Mirrors the taxonomy the ingester and querier both need to reason about:
/// callers branch on the variant, not the message, so additions here should
/// stay coarse.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested object or trace does not exist. Never wrapped further
    /// up the stack -- callers match on this directly.
    #[error("not found")]
    NotFound,

    /// A malformed trace ID, tenant ID, or request parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tenant's ingest rate limit was exceeded.
    #[error("rate limited")]
    RateLimited,

    /// A single trace grew past `max_bytes_per_trace`.
    #[error("trace too large")]
    TraceTooLarge,

    /// Disk or network I/O failed in a way that a caller may retry.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The object storage backend reported a transient failure.
    #[error("blob backend error: {0}")]
    Blob(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// WAL corruption (or any other condition) that prevents an instance
    /// from starting at all. The caller should abort startup, not retry.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A block's on-disk index or metadata side file failed to
    /// (de)serialize.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
