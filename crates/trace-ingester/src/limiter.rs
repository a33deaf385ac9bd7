// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use trace_types::{Error, Result};

/// Enforces per-trace size and per-tenant ingest rate. The ring-aware
/// replica count this subsystem scales rate limits by is an external
/// collaborator's concern; this trait only names the checks an
/// instance needs on the write path.
pub trait Limiter: Send + Sync {
    fn check_trace_size(&self, total_bytes: usize) -> Result<()>;
    fn check_rate(&self) -> Result<()>;
}

/// A limiter backed by static per-tenant configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredLimiter {
    pub max_bytes_per_trace: usize,
}

impl Limiter for ConfiguredLimiter {
    fn check_trace_size(&self, total_bytes: usize) -> Result<()> {
        if total_bytes > self.max_bytes_per_trace {
            return Err(Error::TraceTooLarge);
        }
        Ok(())
    }

    fn check_rate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_trace() {
        let limiter = ConfiguredLimiter { max_bytes_per_trace: 10 };
        assert!(limiter.check_trace_size(5).is_ok());
        assert!(matches!(limiter.check_trace_size(11), Err(Error::TraceTooLarge)));
    }
}
