// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `Redis` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `kube::runtime::Controller` reports changes to a `Redis` or
//!    to one of the children it owns
//! 2. **Re-read** - The pass fetches the latest `Redis` from the cluster
//! 3. **Build** - The desired children are rebuilt from the `Redis`
//!    specification
//! 4. **Converge** - Each child is compared three-way and replaced only when
//!    it has drifted
//!
//! # Modules
//!
//! - [`redis`] - The pass driver, [`reconcile_redis`]
//! - [`resources`] - Diff-and-apply of a single child
//! - [`diff`] - Three-way comparison of observed and desired objects
//! - [`finalizers`] - Finalizer lifecycle and cleanup of children
//! - [`store`] - Cluster object store abstraction over `kube::Api`
//!
//! # Example: Running a Pass
//!
//! ```rust,no_run
//! use redis_operator::reconcilers::{reconcile_redis, KubeStore, PassOutcome};
//! use kube::Client;
//!
//! async fn run_once(client: Client) -> anyhow::Result<()> {
//!     let store = KubeStore::new(client);
//!
//!     match reconcile_redis(&store, "default", "cache").await? {
//!         PassOutcome::Synced(report) => println!("{} children", report.applied.len()),
//!         PassOutcome::Finalized | PassOutcome::Gone => {}
//!     }
//!     Ok(())
//! }
//! ```

pub mod diff;
pub mod finalizers;
pub mod redis;
pub mod resources;
pub mod store;

#[cfg(test)]
pub(crate) mod fake_store;

pub use redis::{reconcile_redis, ChildReport, PassOutcome, PassReport};
pub use resources::{apply_child, delete_child, ApplyOutcome, DeleteOutcome};
pub use store::{ClusterStore, KubeStore, ObjectStore};
