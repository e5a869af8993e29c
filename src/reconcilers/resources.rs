// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Diff-and-apply of child resources.
//!
//! [`apply_child`] converges one child on its desired definition:
//!
//! - **Absent**: link the owner, record the last applied definition, create.
//! - **Present and drifted**: carry server-owned fields and immutable sections
//!   over from the observed object, compare three-way, then replace with the
//!   observed `resourceVersion` as precondition.
//! - **Present and in sync**: nothing is written.
//!
//! Nothing is retried here. Any failure other than not-found on the initial
//! read is returned to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_operator::crd::Redis;
//! use redis_operator::reconcilers::resources::apply_child;
//! use redis_operator::reconcilers::store::KubeStore;
//! use redis_operator::redis_resources::{build_desired_resources, build_owner_reference};
//!
//! async fn example(store: &KubeStore, redis: &Redis) -> anyhow::Result<()> {
//!     let desired = build_desired_resources(redis);
//!     let owner = build_owner_reference(redis);
//!     apply_child(store, "default", desired.service, &owner).await?;
//!     Ok(())
//! }
//! ```

use crate::errors::StoreError;
use crate::metrics;
use crate::reconcilers::diff::{last_applied, set_last_applied, Difference};
use crate::reconcilers::store::ObjectStore;
use crate::redis_resources::{add_owner_reference, drop_unbacked_volume_mounts};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// JSON pointer of the `StatefulSet` claim templates, immutable after creation.
const VOLUME_CLAIM_TEMPLATES: &str = "/spec/volumeClaimTemplates";

/// Result of converging one child resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The child did not exist and was created.
    Created,
    /// The child had drifted and was replaced.
    Updated { immutable_drift: bool },
    /// The child already matched; nothing was written.
    InSync { immutable_drift: bool },
}

impl ApplyOutcome {
    /// Whether an immutable section differed and was left untouched.
    #[must_use]
    pub fn immutable_drift(self) -> bool {
        match self {
            Self::Created => false,
            Self::Updated { immutable_drift } | Self::InSync { immutable_drift } => {
                immutable_drift
            }
        }
    }
}

/// Result of deleting one child resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// A child kind the reconciler converges.
///
/// The defaults cover kinds without server-assigned spec fields or immutable
/// sections.
pub trait ChildResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// JSON pointers left out of the drift comparison.
    const DIFF_EXCLUSIONS: &'static [&'static str] = &[];

    /// Carries server-owned fields from `observed` into `self`.
    fn copy_forward(&mut self, observed: &Self) {
        copy_forward_metadata(self.meta_mut(), observed.meta());
    }

    /// Replaces immutable sections of `self` with the observed ones.
    ///
    /// Returns whether the desired sections differed from the observed ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the sections cannot be serialized for comparison.
    fn retain_immutable(&mut self, _observed: &Self) -> Result<bool, serde_json::Error> {
        Ok(false)
    }
}

impl ChildResource for StatefulSet {
    const DIFF_EXCLUSIONS: &'static [&'static str] = &[VOLUME_CLAIM_TEMPLATES];

    fn retain_immutable(&mut self, observed: &Self) -> Result<bool, serde_json::Error> {
        let observed_templates = observed
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.clone());
        let desired_templates = self
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.clone());

        let baseline = last_applied(observed.meta())
            .and_then(|v| v.pointer(VOLUME_CLAIM_TEMPLATES).cloned());

        if !claim_templates_differ(
            observed_templates.as_ref(),
            desired_templates.as_ref(),
            baseline,
        )? {
            return Ok(false);
        }

        if let Some(spec) = self.spec.as_mut() {
            spec.volume_claim_templates = observed_templates;
        }

        let dropped = drop_unbacked_volume_mounts(self);
        if !dropped.is_empty() {
            debug!(
                name = %self.name_any(),
                mounts = ?dropped,
                "Dropped volume mounts the existing claim templates do not back"
            );
        }
        Ok(true)
    }
}

impl ChildResource for Service {
    fn copy_forward(&mut self, observed: &Self) {
        copy_forward_metadata(&mut self.metadata, &observed.metadata);

        let (Some(spec), Some(observed_spec)) = (self.spec.as_mut(), observed.spec.as_ref()) else {
            return;
        };

        let service_type = |t: &Option<String>| t.clone().unwrap_or_else(|| "ClusterIP".into());
        if service_type(&spec.type_) != service_type(&observed_spec.type_) {
            return;
        }

        spec.cluster_ip.clone_from(&observed_spec.cluster_ip);
        spec.cluster_ips.clone_from(&observed_spec.cluster_ips);

        let observed_ports = observed_spec.ports.as_deref().unwrap_or_default();
        for port in spec.ports.iter_mut().flatten() {
            if port.node_port.is_some() {
                continue;
            }
            port.node_port = observed_ports
                .iter()
                .find(|p| p.name == port.name)
                .and_then(|p| p.node_port);
        }
    }
}

impl ChildResource for PersistentVolumeClaim {}

/// Carries the server-owned metadata of `observed` into `desired`.
pub fn copy_forward_metadata(desired: &mut ObjectMeta, observed: &ObjectMeta) {
    desired.resource_version.clone_from(&observed.resource_version);
    desired.creation_timestamp.clone_from(&observed.creation_timestamp);
    desired.managed_fields.clone_from(&observed.managed_fields);
    desired.uid.clone_from(&observed.uid);
}

/// Adds observed annotations the desired object does not set.
pub fn merge_forward_annotations(desired: &mut ObjectMeta, observed: &ObjectMeta) {
    let Some(observed_annotations) = observed.annotations.as_ref() else {
        return;
    };
    let annotations = desired.annotations.get_or_insert_with(BTreeMap::new);
    for (key, value) in observed_annotations {
        annotations
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

fn claim_templates_differ(
    observed: Option<&Vec<PersistentVolumeClaim>>,
    desired: Option<&Vec<PersistentVolumeClaim>>,
    baseline: Option<Value>,
) -> Result<bool, serde_json::Error> {
    let strip = |value: &mut Value| {
        if let Some(templates) = value.as_array_mut() {
            for template in templates {
                crate::reconcilers::diff::strip_ignored(template, &[]);
            }
        }
    };

    let mut observed = serde_json::to_value(observed)?;
    let mut desired = serde_json::to_value(desired)?;
    let mut baseline = baseline;
    strip(&mut observed);
    strip(&mut desired);
    if let Some(baseline) = baseline.as_mut() {
        strip(baseline);
    }

    Ok(!Difference::between(&observed, &desired, baseline.as_ref()).is_empty())
}

/// Converges one child resource on its desired definition.
///
/// # Arguments
///
/// * `store` - Cluster object store
/// * `namespace` - Namespace of the child
/// * `desired` - Freshly built desired definition
/// * `owner` - Back-reference to the `Redis` that owns the child
///
/// # Returns
///
/// What was done to the child.
///
/// # Errors
///
/// Returns the store error of the failed read or write. Not-found on the
/// initial read is not an error; it triggers creation.
pub async fn apply_child<K, S>(
    store: &S,
    namespace: &str,
    mut desired: K,
    owner: &OwnerReference,
) -> Result<ApplyOutcome, StoreError>
where
    K: ChildResource,
    S: ObjectStore<K> + ?Sized,
{
    let name = desired.name_any();
    let kind = K::kind(&()).to_string();
    let invalid = |e: serde_json::Error| StoreError::invalid_object(&kind, namespace, &name, &e);

    let observed = match store.get(namespace, &name).await {
        Ok(observed) => observed,
        Err(e) if e.is_not_found() => {
            add_owner_reference(desired.meta_mut(), owner.clone());
            set_last_applied(&mut desired).map_err(invalid)?;
            store.create(namespace, &desired).await?;

            info!(namespace = %namespace, name = %name, kind = %kind, "Created resource");
            metrics::record_resource_created(&kind);
            return Ok(ApplyOutcome::Created);
        }
        Err(e) => return Err(e),
    };

    desired.copy_forward(&observed);
    desired
        .meta_mut()
        .owner_references
        .clone_from(&observed.meta().owner_references);
    add_owner_reference(desired.meta_mut(), owner.clone());

    let immutable_drift = desired.retain_immutable(&observed).map_err(invalid)?;
    if immutable_drift {
        warn!(
            namespace = %namespace,
            name = %name,
            kind = %kind,
            "Immutable fields differ from the desired definition; keeping the existing values"
        );
        metrics::record_immutable_drift(&kind);
    }

    let baseline = last_applied(observed.meta());
    let difference = Difference::compute(&observed, &desired, baseline.as_ref(), K::DIFF_EXCLUSIONS)
        .map_err(invalid)?;

    if difference.is_empty() {
        debug!(namespace = %namespace, name = %name, kind = %kind, "Resource is in sync");
        return Ok(ApplyOutcome::InSync { immutable_drift });
    }

    info!(
        namespace = %namespace,
        name = %name,
        kind = %kind,
        changes = %difference,
        "Resource drifted from desired state, updating"
    );

    set_last_applied(&mut desired).map_err(invalid)?;
    merge_forward_annotations(desired.meta_mut(), observed.meta());
    store.replace(namespace, &desired).await?;

    metrics::record_resource_updated(&kind);
    Ok(ApplyOutcome::Updated { immutable_drift })
}

/// Deletes one child resource, treating an absent child as done.
///
/// # Errors
///
/// Returns the store error of the delete, unless it is not-found.
pub async fn delete_child<K, S>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<DeleteOutcome, StoreError>
where
    K: ChildResource,
    S: ObjectStore<K> + ?Sized,
{
    let kind = K::kind(&()).to_string();

    match store.delete(namespace, name).await {
        Ok(()) => {
            info!(namespace = %namespace, name = %name, kind = %kind, "Deleted resource");
            metrics::record_resource_deleted(&kind);
            Ok(DeleteOutcome::Deleted)
        }
        Err(e) if e.is_not_found() => {
            debug!(namespace = %namespace, name = %name, kind = %kind, "Resource already absent");
            Ok(DeleteOutcome::AlreadyAbsent)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
