// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
use async_trait::async_trait;
use std::collections::HashMap;
use trace_types::Result;

use crate::replication::ReplicationSet;

/// The ring is an external collaborator in production (a gossiping
/// membership protocol); this crate only needs to resolve a tenant to
/// its current replica set for a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingOp {
    Read,
    Write,
}

#[async_trait]
pub trait Ring: Send + Sync {
    async fn get(&self, tenant: &str, op: RingOp) -> Result<ReplicationSet>;
}

/// A fixed, non-gossiping ring used by tests: every tenant maps to the
/// same static set of addresses and quorum parameters.
pub struct StaticRing {
    addrs: Vec<String>,
    min_success: usize,
    max_failure: usize,
}

impl StaticRing {
    pub fn new(addrs: Vec<String>, min_success: usize, max_failure: usize) -> Self {
        Self {
            addrs,
            min_success,
            max_failure,
        }
    }
}

#[async_trait]
impl Ring for StaticRing {
    async fn get(&self, _tenant: &str, _op: RingOp) -> Result<ReplicationSet> {
        Ok(ReplicationSet {
            addrs: self.addrs.clone(),
            min_success: self.min_success,
            max_failure: self.max_failure,
        })
    }
}

/// A ring keyed by tenant, for tests that need different replica sets
/// per tenant.
pub struct TenantRing {
    by_tenant: HashMap<String, ReplicationSet>,
}

impl TenantRing {
    pub fn new(by_tenant: HashMap<String, ReplicationSet>) -> Self {
        Self { by_tenant }
    }
}

#[async_trait]
impl Ring for TenantRing {
    async fn get(&self, tenant: &str, _op: RingOp) -> Result<ReplicationSet> {
        self.by_tenant
            .get(tenant)
            .cloned()
            .ok_or_else(|| trace_types::Error::InvalidInput(format!("unknown tenant {tenant}")))
    }
}
