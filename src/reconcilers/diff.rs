// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Structural comparison of observed and desired resources.
//!
//! The API server fills in defaults (`dnsPolicy`, `sessionAffinity`,
//! `terminationMessagePath`, ...) that the operator never asks for. Comparing
//! desired objects against the raw observed object would see those defaults as
//! drift on every pass, so the comparison is three-way:
//!
//! 1. Both sides are serialized to JSON and stripped of bookkeeping
//!    (`status`, `kind`, `apiVersion`, server-owned metadata).
//! 2. The observed object is projected onto the keys present in the desired
//!    object or in the last definition the operator applied. Keys only the
//!    server knows about fall away; keys the operator used to set but no
//!    longer does are kept so that their removal shows up.
//! 3. A JSON patch from the projection to the desired object is computed. An
//!    empty patch means the object is in sync.
//!
//! The last applied definition lives in the
//! [`ANNOTATION_LAST_APPLIED`] annotation of each child.

use crate::labels::{ANNOTATION_LAST_APPLIED, KUBECTL_LAST_APPLIED};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Top-level fields never compared.
const IGNORED_FIELDS: [&str; 3] = ["status", "kind", "apiVersion"];

/// Metadata fields owned by the API server.
const SERVER_METADATA_FIELDS: [&str; 6] = [
    "resourceVersion",
    "creationTimestamp",
    "managedFields",
    "uid",
    "generation",
    "selfLink",
];

/// Difference between an observed and a desired object.
#[derive(Clone, Debug)]
pub struct Difference {
    patch: json_patch::Patch,
}

impl Difference {
    /// Compares `observed` against `desired`.
    ///
    /// # Arguments
    ///
    /// * `observed` - The object as stored in the cluster
    /// * `desired` - The object the operator wants
    /// * `baseline` - The last definition applied, decoded from the annotation
    /// * `exclusions` - JSON pointers removed from all three before comparing
    ///
    /// # Errors
    ///
    /// Returns an error if either object cannot be serialized.
    pub fn compute<T: Serialize>(
        observed: &T,
        desired: &T,
        baseline: Option<&Value>,
        exclusions: &[&str],
    ) -> Result<Self, serde_json::Error> {
        let mut observed = serde_json::to_value(observed)?;
        let mut desired = serde_json::to_value(desired)?;
        let mut baseline = baseline.cloned();

        for value in [&mut observed, &mut desired]
            .into_iter()
            .chain(baseline.as_mut())
        {
            strip_ignored(value, exclusions);
        }

        Ok(Self::between(&observed, &desired, baseline.as_ref()))
    }

    /// Compares two already-stripped JSON values.
    #[must_use]
    pub fn between(observed: &Value, desired: &Value, baseline: Option<&Value>) -> Self {
        let projected = project(observed, desired, baseline);
        Self {
            patch: json_patch::diff(&projected, desired),
        }
    }

    /// Whether the objects are in sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patch.0.is_empty()
    }

    /// Number of patch operations needed to converge.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patch.0.len()
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.patch) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => write!(f, "<{} operations>", self.len()),
        }
    }
}

/// Removes bookkeeping and excluded paths from a serialized object.
pub fn strip_ignored(value: &mut Value, exclusions: &[&str]) {
    let Some(object) = value.as_object_mut() else {
        return;
    };

    for field in IGNORED_FIELDS {
        object.remove(field);
    }

    if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
        for field in SERVER_METADATA_FIELDS {
            metadata.remove(field);
        }
        if let Some(annotations) = metadata
            .get_mut("annotations")
            .and_then(Value::as_object_mut)
        {
            annotations.remove(ANNOTATION_LAST_APPLIED);
            annotations.remove(KUBECTL_LAST_APPLIED);
        }
    }

    for pointer in exclusions {
        remove_pointer(value, pointer);
    }
}

fn remove_pointer(value: &mut Value, pointer: &str) {
    let Some((parent, key)) = pointer.rsplit_once('/') else {
        return;
    };
    if let Some(object) = value.pointer_mut(parent).and_then(Value::as_object_mut) {
        object.remove(key);
    }
}

/// Projects `observed` onto the shape of `desired` and `baseline`.
///
/// Object keys survive when the desired object or the baseline has them.
/// Arrays of equal length are projected element by element; arrays of
/// different length are kept whole since they differ anyway.
#[must_use]
pub fn project(observed: &Value, desired: &Value, baseline: Option<&Value>) -> Value {
    match (observed, desired) {
        (Value::Object(observed), Value::Object(desired)) => {
            let baseline = baseline.and_then(Value::as_object);
            let mut projected = Map::new();

            for (key, observed_value) in observed {
                let baseline_value = baseline.and_then(|b| b.get(key));
                match desired.get(key) {
                    Some(desired_value) => {
                        projected.insert(
                            key.clone(),
                            project(observed_value, desired_value, baseline_value),
                        );
                    }
                    None if baseline_value.is_some() => {
                        projected.insert(key.clone(), observed_value.clone());
                    }
                    None => {}
                }
            }

            Value::Object(projected)
        }
        (Value::Array(observed), Value::Array(desired)) if observed.len() == desired.len() => {
            let baseline = baseline.and_then(Value::as_array);
            Value::Array(
                observed
                    .iter()
                    .zip(desired)
                    .enumerate()
                    .map(|(i, (o, d))| project(o, d, baseline.and_then(|b| b.get(i))))
                    .collect(),
            )
        }
        _ => observed.clone(),
    }
}

/// Decodes the last applied definition recorded on an object.
///
/// A missing or unparsable annotation yields `None`; the comparison then
/// falls back to two-way.
#[must_use]
pub fn last_applied(meta: &ObjectMeta) -> Option<Value> {
    meta.annotations
        .as_ref()?
        .get(ANNOTATION_LAST_APPLIED)
        .and_then(|encoded| serde_json::from_str(encoded).ok())
}

/// Records `object`'s current definition as its last applied annotation.
///
/// # Errors
///
/// Returns an error if the object cannot be serialized.
pub fn set_last_applied<K>(object: &mut K) -> Result<(), serde_json::Error>
where
    K: Resource + Serialize,
{
    let mut value = serde_json::to_value(&*object)?;
    strip_ignored(&mut value, &[]);
    let encoded = serde_json::to_string(&value)?;

    object
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ANNOTATION_LAST_APPLIED.to_string(), encoded);

    Ok(())
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
