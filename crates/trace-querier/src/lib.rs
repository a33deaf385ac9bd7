// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
pub mod blocklist;
pub mod client;
pub mod merge;
pub mod querier;
pub mod replication;
pub mod ring;

pub use blocklist::Blocklist;
pub use client::{ClientPool, IngesterClient};
pub use querier::{QueryMode, Querier};
pub use replication::ReplicationSet;
pub use ring::{Ring, RingOp, StaticRing, TenantRing};
