// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Redis standalone reconciliation logic.
//!
//! One pass converges a single `Redis` instance:
//!
//! 1. Re-fetch the `Redis` by namespace and name. If it is gone, stop.
//! 2. If it is being deleted, clean up its children and release the finalizer.
//! 3. Otherwise make sure the finalizer is present before any child exists.
//! 4. Converge the `StatefulSet`, the headless `Service` and the primary
//!    `Service`, in that order.
//!
//! A child rejected as unprocessable is logged and skipped so the remaining
//! children still converge. Any other failure ends the pass; the controller
//! requeues it.

use crate::constants::KIND_REDIS;
use crate::crd::Redis;
use crate::errors::StoreError;
use crate::labels::FINALIZER_REDIS;
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, handle_deletion, LifecycleState};
use crate::reconcilers::resources::{apply_child, ApplyOutcome, ChildResource};
use crate::reconcilers::store::{ClusterStore, ObjectStore};
use crate::redis_resources::{build_desired_resources, build_owner_reference};
use anyhow::Result;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

/// What happened to one child during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildReport {
    pub kind: String,
    pub name: String,
    pub outcome: ApplyOutcome,
}

/// Summary of a completed pass over a live `Redis`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Children converged, in the order they were applied.
    pub applied: Vec<ChildReport>,
    /// Children the API server rejected as unprocessable, as `(kind, name)`.
    pub skipped: Vec<(String, String)>,
}

impl PassReport {
    /// Whether any child was created or replaced.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.applied
            .iter()
            .any(|child| !matches!(child.outcome, ApplyOutcome::InSync { .. }))
    }

    /// Whether any child has immutable fields that differ from the desired definition.
    #[must_use]
    pub fn immutable_drift(&self) -> bool {
        self.applied
            .iter()
            .any(|child| child.outcome.immutable_drift())
    }
}

/// Result of one reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The instance is live and its children were converged.
    Synced(PassReport),
    /// The instance is being deleted and holds no more claims on its children.
    Finalized,
    /// The instance no longer exists.
    Gone,
}

/// Reconciles a `Redis` resource.
///
/// The latest definition is always re-read from the store, so a stale copy
/// handed in by a watch never drives the pass.
///
/// # Arguments
///
/// * `store` - Cluster object store
/// * `namespace` - Namespace of the `Redis`
/// * `name` - Name of the `Redis`
///
/// # Errors
///
/// Returns an error if reading the `Redis`, updating its finalizer, cleaning up
/// its children, or converging a child fails for any reason other than the
/// child being unprocessable.
pub async fn reconcile_redis<S>(store: &S, namespace: &str, name: &str) -> Result<PassOutcome>
where
    S: ClusterStore + ?Sized,
{
    let redis = match <S as ObjectStore<Redis>>::get(store, namespace, name).await {
        Ok(redis) => redis,
        Err(e) if e.is_not_found() => {
            debug!(namespace = %namespace, name = %name, "Redis no longer exists");
            return Ok(PassOutcome::Gone);
        }
        Err(e) => return Err(e.into()),
    };

    info!("Reconciling Redis: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?redis.metadata.generation,
        resource_version = ?redis.metadata.resource_version,
        "Starting Redis reconciliation"
    );

    match LifecycleState::of(&redis, FINALIZER_REDIS) {
        LifecycleState::Deleting => {
            handle_deletion(store, &redis, FINALIZER_REDIS).await?;
            return Ok(PassOutcome::Finalized);
        }
        LifecycleState::Deleted => {
            debug!(namespace = %namespace, name = %name, "Redis is being deleted, nothing left to clean up");
            return Ok(PassOutcome::Finalized);
        }
        LifecycleState::ActiveUnmarked => {
            ensure_finalizer(store, &redis, FINALIZER_REDIS).await?;
        }
        LifecycleState::ActiveMarked => {}
    }

    let desired = build_desired_resources(&redis);
    let owner = build_owner_reference(&redis);
    let mut report = PassReport::default();

    converge(store, namespace, desired.statefulset, &owner, &mut report).await?;
    converge(store, namespace, desired.headless_service, &owner, &mut report).await?;
    converge(store, namespace, desired.service, &owner, &mut report).await?;

    if report.changed() {
        info!(
            "Successfully reconciled Redis {}/{} ({} children)",
            namespace,
            redis.name_any(),
            report.applied.len()
        );
    } else {
        debug!(namespace = %namespace, name = %name, "All children in sync");
    }

    Ok(PassOutcome::Synced(report))
}

/// Converges one child and records the outcome in `report`.
async fn converge<K, S>(
    store: &S,
    namespace: &str,
    desired: K,
    owner: &OwnerReference,
    report: &mut PassReport,
) -> Result<(), StoreError>
where
    K: ChildResource,
    S: ObjectStore<K> + ?Sized,
{
    let kind = K::kind(&()).to_string();
    let name = desired.name_any();

    match apply_child(store, namespace, desired, owner).await {
        Ok(outcome) => {
            report.applied.push(ChildReport {
                kind,
                name,
                outcome,
            });
            Ok(())
        }
        Err(e) if !e.aborts_pass() => {
            warn!(
                namespace = %namespace,
                name = %name,
                kind = %kind,
                error = %e,
                "Child rejected as unprocessable, continuing with the remaining children"
            );
            metrics::record_error(KIND_REDIS, e.error_type());
            report.skipped.push((kind, name));
            Ok(())
        }
        Err(e) => {
            error!(
                "Failed to converge {} {}/{}: {}",
                kind, namespace, name, e
            );
            metrics::record_error(KIND_REDIS, e.error_type());
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod redis_tests;
