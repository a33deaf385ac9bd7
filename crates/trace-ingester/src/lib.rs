// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
pub mod buffer;
pub mod instance;
pub mod limiter;
pub mod live_trace;
pub mod store;

pub use buffer::TraceBuffer;
pub use instance::Instance;
pub use limiter::{ConfiguredLimiter, Limiter};
pub use live_trace::LiveTrace;
pub use store::Store;
