// Copyright 2024 Trace Store Authors
// SPDX-License-Identifier: Apache-2.0, MIT
pub mod blobstore;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod rpc;

pub use blobstore::LocalStore;
pub use cli::{Cli, Command};
pub use config::Config;
pub use rpc::{router, IngesterRpc};
