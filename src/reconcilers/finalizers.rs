// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for Redis resources.
//!
//! A `Redis` carries the [`FINALIZER_REDIS`] finalizer for as long as it has
//! children that the platform will not garbage-collect on its own (the
//! Services and the data volume claim). The finalizer is added before any
//! child is created and removed only after every child has been cleaned up.
//!
//! # Example
//!
//! ```rust,ignore
//! use redis_operator::labels::FINALIZER_REDIS;
//! use redis_operator::reconcilers::finalizers::{ensure_finalizer, handle_deletion, LifecycleState};
//!
//! match LifecycleState::of(&redis, FINALIZER_REDIS) {
//!     LifecycleState::Deleting => handle_deletion(store, &redis, FINALIZER_REDIS).await?,
//!     LifecycleState::ActiveUnmarked => {
//!         ensure_finalizer(store, &redis, FINALIZER_REDIS).await?;
//!     }
//!     _ => {}
//! }
//! ```
//!
//! [`FINALIZER_REDIS`]: crate::labels::FINALIZER_REDIS

use crate::crd::Redis;
use crate::reconcilers::resources::delete_child;
use crate::reconcilers::store::{ClusterStore, ObjectStore};
use crate::redis_resources::{data_claim_name, headless_service_name, service_name};
use anyhow::Result;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::{Resource, ResourceExt};
use tracing::info;

/// Where a resource stands in its finalizer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Live, finalizer not yet added.
    ActiveUnmarked,
    /// Live, finalizer present.
    ActiveMarked,
    /// Deletion requested, cleanup still owed.
    Deleting,
    /// Deletion requested and the finalizer is gone; nothing left to do.
    Deleted,
}

impl LifecycleState {
    /// Derives the lifecycle state from a resource's metadata.
    #[must_use]
    pub fn of<T: Resource>(resource: &T, finalizer: &str) -> Self {
        let meta = resource.meta();
        let marked = has_finalizer(resource, finalizer);

        match (meta.deletion_timestamp.is_some(), marked) {
            (false, false) => Self::ActiveUnmarked,
            (false, true) => Self::ActiveMarked,
            (true, true) => Self::Deleting,
            (true, false) => Self::Deleted,
        }
    }
}

fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Trait for resources that require cleanup operations when being deleted.
///
/// Implement this trait to define custom cleanup logic that should run
/// before a finalizer is removed from a resource.
#[async_trait::async_trait]
pub trait FinalizerCleanup: Resource + ResourceExt + Clone + Send + Sync {
    /// Perform cleanup operations before the finalizer is removed.
    ///
    /// # Errors
    ///
    /// If this method returns an error, the finalizer will NOT be removed and
    /// deletion will be blocked until cleanup succeeds on a later pass.
    async fn cleanup<S>(&self, store: &S) -> Result<()>
    where
        S: ClusterStore + ?Sized;
}

#[async_trait::async_trait]
impl FinalizerCleanup for Redis {
    /// Deletes the primary Service, the headless Service and the data volume
    /// claim, in that order. Children that are already gone are skipped. The
    /// `StatefulSet` is left to owner-reference garbage collection.
    async fn cleanup<S>(&self, store: &S) -> Result<()>
    where
        S: ClusterStore + ?Sized,
    {
        let namespace = self.namespace().unwrap_or_default();
        let name = self.name_any();

        delete_child::<Service, S>(store, &namespace, &service_name(&name)).await?;
        delete_child::<Service, S>(store, &namespace, &headless_service_name(&name)).await?;
        delete_child::<PersistentVolumeClaim, S>(store, &namespace, &data_claim_name(&name))
            .await?;

        Ok(())
    }
}

/// Add a finalizer to a resource if not already present.
///
/// The operation is idempotent - calling it multiple times has no effect if
/// the finalizer is already present.
///
/// # Returns
///
/// `true` if the finalizer was added, `false` if it was already present.
///
/// # Errors
///
/// Returns an error if persisting the new finalizer list fails.
pub async fn ensure_finalizer<T, S>(store: &S, resource: &T, finalizer: &str) -> Result<bool>
where
    T: Resource<DynamicType = ()> + ResourceExt + Send + Sync + 'static,
    S: ObjectStore<T> + ?Sized,
{
    if has_finalizer(resource, finalizer) {
        return Ok(false);
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    info!(
        "Adding finalizer {} to {}/{} {}",
        finalizer,
        namespace,
        name,
        T::kind(&())
    );

    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.push(finalizer.to_string());
    store
        .patch_finalizers(&namespace, &name, &finalizers)
        .await?;

    Ok(true)
}

/// Remove a finalizer from a resource.
///
/// The operation is idempotent - calling it multiple times has no effect if
/// the finalizer is already absent.
///
/// **Note:** Typically you should use `handle_deletion()` instead of calling
/// this function directly, as it performs cleanup before removing the finalizer.
///
/// # Errors
///
/// Returns an error if persisting the new finalizer list fails.
pub async fn remove_finalizer<T, S>(store: &S, resource: &T, finalizer: &str) -> Result<()>
where
    T: Resource<DynamicType = ()> + ResourceExt + Send + Sync + 'static,
    S: ObjectStore<T> + ?Sized,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    info!(
        "Removing finalizer {} from {}/{} {}",
        finalizer,
        namespace,
        name,
        T::kind(&())
    );

    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    finalizers.retain(|f| f != finalizer);
    store
        .patch_finalizers(&namespace, &name, &finalizers)
        .await?;

    info!(
        "Successfully removed finalizer {} from {}/{} {}",
        finalizer,
        namespace,
        name,
        T::kind(&())
    );

    Ok(())
}

/// Handle resource deletion with cleanup and finalizer removal.
///
/// This function orchestrates the complete deletion process:
/// 1. Calls the resource's `cleanup()` method
/// 2. Removes the finalizer so the platform can delete the resource
///
/// Nothing happens if the finalizer is already gone.
///
/// # Errors
///
/// Returns an error if cleanup or the finalizer removal fails. The finalizer
/// then stays on the resource and deletion is retried on a later pass.
pub async fn handle_deletion<T, S>(store: &S, resource: &T, finalizer: &str) -> Result<()>
where
    T: FinalizerCleanup + Resource<DynamicType = ()> + 'static,
    S: ClusterStore + ObjectStore<T> + ?Sized,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();

    info!("{} {}/{} is being deleted", T::kind(&()), namespace, name);

    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    info!(
        "Running cleanup for {} {}/{}",
        T::kind(&()),
        namespace,
        name
    );

    resource.cleanup(store).await?;
    remove_finalizer(store, resource, finalizer).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
