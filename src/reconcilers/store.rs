// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster object store used by the reconcilers.
//!
//! The reconcilers never talk to `kube::Api` directly. They go through
//! [`ObjectStore`], which exposes the handful of operations a reconciliation
//! pass needs and maps every failure onto [`StoreError`]. [`KubeStore`] is the
//! production implementation; tests substitute an in-memory store.

use crate::crd::Redis;
use crate::errors::StoreError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

/// Namespaced read/write access to objects of kind `K`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Fetch an object by name. A missing object is `StoreError::NotFound`.
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    /// Create an object. The name is taken from its metadata.
    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an object wholesale.
    ///
    /// The object's `resourceVersion` is a precondition: if the stored object
    /// has moved on, the write fails with `StoreError::Conflict`.
    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Overwrite the finalizer list of an object.
    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: &[String],
    ) -> Result<(), StoreError>;
}

/// Every kind a Redis reconciliation pass reads or writes.
pub trait ClusterStore:
    ObjectStore<Redis>
    + ObjectStore<StatefulSet>
    + ObjectStore<Service>
    + ObjectStore<PersistentVolumeClaim>
{
}

impl<T> ClusterStore for T where
    T: ObjectStore<Redis>
        + ObjectStore<StatefulSet>
        + ObjectStore<Service>
        + ObjectStore<PersistentVolumeClaim>
{
}

/// [`ObjectStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.api::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, name))
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        debug!(namespace = %namespace, name = %name, kind = %K::kind(&()), "Creating resource");

        self.api::<K>(namespace)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, &name))
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        debug!(namespace = %namespace, name = %name, kind = %K::kind(&()), "Replacing resource");

        self.api::<K>(namespace)
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, &name))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        debug!(namespace = %namespace, name = %name, kind = %K::kind(&()), "Deleting resource");

        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, name))
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        let patch = json!({ "metadata": { "finalizers": finalizers } });

        self.api::<K>(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, &K::kind(&()), namespace, name))
    }
}
