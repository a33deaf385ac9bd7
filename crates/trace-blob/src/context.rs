// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use tokio_util::sync::CancellationToken;

/// Carries per-call cancellation into every blob I/O call, standing in
/// for the source's deadline/context handle. Cooperative: a call must
/// check this at I/O suspension points and return promptly once it
/// fires, not poll it continuously.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}
