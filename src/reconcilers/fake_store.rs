// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] for reconciler tests.
//!
//! Objects are kept as JSON keyed by kind, namespace and name. Writes behave
//! like the API server where it matters to the reconcilers: resource versions
//! are enforced on replace, a handful of spec defaults are filled in, and an
//! object being deleted disappears once its last finalizer is removed.
//! Failures can be injected per operation, kind and name.

use crate::crd::Redis;
use crate::errors::StoreError;
use crate::reconcilers::store::ObjectStore;
use async_trait::async_trait;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

pub(crate) const NAMESPACE: &str = "default";
pub(crate) const REDIS_UID: &str = "6a0e3c1e-0000-4000-8000-00000000cafe";

/// Operations the store records and can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Get,
    Create,
    Replace,
    Delete,
    PatchFinalizers,
}

/// Kinds of injected failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Failure {
    Conflict,
    Unprocessable,
    Transport,
}

struct InjectedFailure {
    op: Op,
    kind: String,
    name: String,
    failure: Failure,
    remaining: usize,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String, String), Value>,
    next_version: u64,
    next_cluster_ip: u8,
    failures: Vec<InjectedFailure>,
    log: Vec<(Op, String, String)>,
}

#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<State>,
}

fn key(kind: &str, namespace: &str, name: &str) -> (String, String, String) {
    (kind.to_string(), namespace.to_string(), name.to_string())
}

fn not_found(kind: &str, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails the next `times` calls of `op` on `kind`/`name`.
    pub(crate) fn fail(&self, op: Op, kind: &str, name: &str, failure: Failure, times: usize) {
        self.state.lock().unwrap().failures.push(InjectedFailure {
            op,
            kind: kind.to_string(),
            name: name.to_string(),
            failure,
            remaining: times,
        });
    }

    /// Stores an object as-is, bypassing defaults and version checks.
    pub(crate) fn put<K: Resource<DynamicType = ()> + Serialize>(&self, object: &K) {
        let meta = object.meta();
        let value = serde_json::to_value(object).unwrap();
        self.state.lock().unwrap().objects.insert(
            key(
                &K::kind(&()),
                meta.namespace.as_deref().unwrap_or(NAMESPACE),
                meta.name.as_deref().unwrap_or_default(),
            ),
            value,
        );
    }

    /// Reads an object directly, bypassing logging and failures.
    pub(crate) fn peek<K: Resource<DynamicType = ()> + DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<K> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&key(&K::kind(&()), NAMESPACE, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    /// Edits a stored object in place, bumping its resource version.
    pub(crate) fn edit<K, F>(&self, name: &str, edit: F)
    where
        K: Resource<DynamicType = ()> + DeserializeOwned + Serialize,
        F: FnOnce(&mut K),
    {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version = state.next_version.to_string();
        let entry = state
            .objects
            .get_mut(&key(&K::kind(&()), NAMESPACE, name))
            .unwrap();
        let mut object: K = serde_json::from_value(entry.clone()).unwrap();
        edit(&mut object);
        object.meta_mut().resource_version = Some(version);
        *entry = serde_json::to_value(&object).unwrap();
    }

    /// Writes recorded so far, as `(op, kind, name)`, excluding reads.
    pub(crate) fn writes(&self) -> Vec<(Op, String, String)> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(op, _, _)| *op != Op::Get)
            .cloned()
            .collect()
    }

    pub(crate) fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn check(&self, state: &mut State, op: Op, kind: &str, namespace: &str, name: &str) -> Result<(), StoreError> {
        state.log.push((op, kind.to_string(), name.to_string()));

        let Some(injected) = state
            .failures
            .iter_mut()
            .find(|f| f.op == op && f.kind == kind && f.name == name && f.remaining > 0)
        else {
            return Ok(());
        };
        injected.remaining -= 1;

        let (kind, namespace, name) = (kind.to_string(), namespace.to_string(), name.to_string());
        let message = format!("injected {op:?} failure");
        Err(match injected.failure {
            Failure::Conflict => StoreError::Conflict { kind, namespace, name, message },
            Failure::Unprocessable => StoreError::Unprocessable { kind, namespace, name, message },
            Failure::Transport => StoreError::Transport { kind, namespace, name, message },
        })
    }
}

/// Fills in a few of the defaults the API server adds.
fn apply_server_defaults(kind: &str, value: &mut Value, cluster_ip: &str) {
    match kind {
        "Service" => {
            let spec = &mut value["spec"];
            if spec.get("clusterIP").is_none() {
                spec["clusterIP"] = json!(cluster_ip);
                spec["clusterIPs"] = json!([cluster_ip]);
            }
            spec["sessionAffinity"] = json!("None");
            spec["internalTrafficPolicy"] = json!("Cluster");
        }
        "StatefulSet" => {
            let spec = &mut value["spec"];
            spec["podManagementPolicy"] = json!("OrderedReady");
            spec["revisionHistoryLimit"] = json!(10);
            let pod = &mut spec["template"]["spec"];
            pod["dnsPolicy"] = json!("ClusterFirst");
            pod["restartPolicy"] = json!("Always");
            if let Some(containers) = pod["containers"].as_array_mut() {
                for container in containers {
                    container["terminationMessagePath"] = json!("/dev/termination-log");
                }
            }
            if let Some(templates) = spec["volumeClaimTemplates"].as_array_mut() {
                for template in templates {
                    template["apiVersion"] = json!("v1");
                    template["kind"] = json!("PersistentVolumeClaim");
                    template["status"] = json!({ "phase": "Pending" });
                }
            }
            value["status"] = json!({ "replicas": 1, "availableReplicas": 1 });
        }
        _ => {}
    }
}

#[async_trait]
impl<K> ObjectStore<K> for FakeStore
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, Op::Get, &kind, namespace, name)?;

        state
            .objects
            .get(&key(&kind, namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .ok_or_else(|| not_found(&kind, namespace, name))
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let name = object.meta().name.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, Op::Create, &kind, namespace, &name)?;

        let object_key = key(&kind, namespace, &name);
        if state.objects.contains_key(&object_key) {
            return Err(StoreError::Conflict {
                kind,
                namespace: namespace.to_string(),
                name,
                message: "already exists".to_string(),
            });
        }

        state.next_version += 1;
        state.next_cluster_ip += 1;
        let cluster_ip = format!("10.96.0.{}", state.next_cluster_ip);

        let mut value = serde_json::to_value(object).unwrap();
        value["metadata"]["namespace"] = json!(namespace);
        value["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        value["metadata"]["uid"] = json!(format!("{kind}-{name}-uid").to_lowercase());
        value["metadata"]["creationTimestamp"] = json!("2025-06-01T00:00:00Z");
        apply_server_defaults(&kind, &mut value, &cluster_ip);

        state.objects.insert(object_key, value.clone());
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let kind = K::kind(&()).to_string();
        let name = object.meta().name.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, Op::Replace, &kind, namespace, &name)?;

        let object_key = key(&kind, namespace, &name);
        let Some(stored) = state.objects.get(&object_key).cloned() else {
            return Err(not_found(&kind, namespace, &name));
        };

        if stored["metadata"]["resourceVersion"].as_str() != object.meta().resource_version.as_deref() {
            return Err(StoreError::Conflict {
                kind,
                namespace: namespace.to_string(),
                name,
                message: "the object has been modified".to_string(),
            });
        }

        state.next_version += 1;
        let mut value = serde_json::to_value(object).unwrap();
        value["metadata"]["resourceVersion"] = json!(state.next_version.to_string());
        let cluster_ip = stored["spec"]["clusterIP"].as_str().unwrap_or("10.96.0.250").to_string();
        apply_server_defaults(&kind, &mut value, &cluster_ip);

        state.objects.insert(object_key, value.clone());
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let kind = K::kind(&()).to_string();
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, Op::Delete, &kind, namespace, name)?;

        state
            .objects
            .remove(&key(&kind, namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(&kind, namespace, name))
    }

    async fn patch_finalizers(
        &self,
        namespace: &str,
        name: &str,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        let kind = K::kind(&()).to_string();
        let mut state = self.state.lock().unwrap();
        self.check(&mut state, Op::PatchFinalizers, &kind, namespace, name)?;

        let object_key = key(&kind, namespace, name);
        let Some(stored) = state.objects.get_mut(&object_key) else {
            return Err(not_found(&kind, namespace, name));
        };

        stored["metadata"]["finalizers"] = json!(finalizers);
        let deleting = stored["metadata"].get("deletionTimestamp").is_some();
        if deleting && finalizers.is_empty() {
            state.objects.remove(&object_key);
        } else {
            state.next_version += 1;
            let version = state.next_version.to_string();
            if let Some(stored) = state.objects.get_mut(&object_key) {
                stored["metadata"]["resourceVersion"] = json!(version);
            }
        }
        Ok(())
    }
}

/// A `Redis` as stored in the cluster, built from its spec.
pub(crate) fn redis(name: &str, spec: Value) -> Redis {
    let mut redis = Redis::new(name, serde_json::from_value(spec).unwrap());
    redis.metadata.namespace = Some(NAMESPACE.to_string());
    redis.metadata.uid = Some(REDIS_UID.to_string());
    redis.metadata.resource_version = Some("1".to_string());
    redis
}

pub(crate) fn minimal_spec() -> Value {
    json!({ "kubernetesConfig": { "image": "quay.io/opstree/redis:v7.0.12" } })
}

/// Marks an object as being deleted.
pub(crate) fn mark_deleted<K: Resource>(object: &mut K) {
    object.meta_mut().deletion_timestamp =
        Some(serde_json::from_value(json!("2025-06-02T00:00:00Z")).unwrap());
}
