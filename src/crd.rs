// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for a single-instance Redis deployment.
//!
//! A [`Redis`] resource describes one standalone Redis server. The operator
//! turns it into a `StatefulSet` with one replica, a primary `Service` and a
//! headless `Service`, and keeps those children converged on the description.
//!
//! # Example
//!
//! ```rust,no_run
//! use redis_operator::crd::{KubernetesConfig, Redis, RedisSpec};
//!
//! let spec = RedisSpec {
//!     kubernetes_config: KubernetesConfig {
//!         image: "quay.io/opstree/redis:v7.0.12".to_string(),
//!         image_pull_policy: None,
//!         resources: None,
//!         redis_secret: None,
//!         image_pull_secrets: None,
//!         service_type: None,
//!     },
//!     redis_config: None,
//!     storage: None,
//!     redis_exporter: None,
//!     tls: None,
//!     sidecars: None,
//!     env: None,
//!     readiness_probe: None,
//!     liveness_probe: None,
//!     node_selector: None,
//!     security_context: None,
//!     priority_class_name: None,
//!     affinity: None,
//!     tolerations: None,
//! };
//!
//! let redis = Redis::new("cache", spec);
//! ```

use k8s_openapi::api::core::v1::{
    Affinity, EnvVar, LocalObjectReference, PersistentVolumeClaim, PodSecurityContext,
    ResourceRequirements, SecretVolumeSource, Toleration,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Redis describes a standalone Redis server managed by the operator.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "redis.firestoned.io",
    version = "v1alpha1",
    kind = "Redis",
    plural = "redis",
    namespaced,
    shortname = "rds",
    doc = "Redis represents a single-instance Redis server. The operator creates a StatefulSet with one replica, a client Service and a headless Service for it, and removes the Services and the data volume claim when the Redis is deleted."
)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Image, pull policy, resources and credentials of the Redis container.
    pub kubernetes_config: KubernetesConfig,

    /// Additional Redis configuration supplied through a `ConfigMap`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_config: Option<RedisConfig>,

    /// Persistent storage for `/data`. Without it the instance is ephemeral.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,

    /// Prometheus exporter sidecar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_exporter: Option<RedisExporter>,

    /// TLS certificates for client connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    /// Extra containers appended to the pod after the Redis and exporter containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecars: Option<Vec<Sidecar>>,

    /// Extra environment variables for the Redis container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,

    /// Readiness probe timings. Defaults apply to unset fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,

    /// Liveness probe timings. Defaults apply to unset fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
}

/// Container-level settings of the Redis server.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfig {
    /// Redis container image.
    pub image: String,

    /// Image pull policy (`Always`, `IfNotPresent`, `Never`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Compute resources of the Redis container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Secret holding the Redis password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_secret: Option<ExistingPasswordSecret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    /// Type of the primary Service. Defaults to `ClusterIP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<ServiceType>,
}

/// Reference to a key inside an existing `Secret`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ExistingPasswordSecret {
    /// Name of the `Secret` in the Redis namespace.
    pub name: String,
    /// Key within the `Secret` holding the password.
    pub key: String,
}

/// Type of the primary Service.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ServiceType {
    /// Reachable only from inside the cluster.
    #[default]
    ClusterIP,
    /// Exposed on a static port of every node.
    NodePort,
    /// Exposed through a cloud load balancer.
    LoadBalancer,
}

impl ServiceType {
    /// Service type as written into `spec.type`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClusterIP => "ClusterIP",
            Self::NodePort => "NodePort",
            Self::LoadBalancer => "LoadBalancer",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisConfig {
    /// Name of a `ConfigMap` mounted at `/etc/redis/external.conf.d`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_redis_config: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Template for the data volume claim.
    ///
    /// Access modes default to `ReadWriteOnce` and the volume mode to
    /// `Filesystem`. The template cannot be changed once the `StatefulSet` exists.
    pub volume_claim_template: PersistentVolumeClaim,
}

/// Prometheus exporter sidecar settings.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedisExporter {
    /// Whether the exporter runs and its port is published on the primary Service.
    #[serde(default)]
    pub enabled: bool,

    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Extra environment variables for the exporter container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,
}

/// TLS material mounted under `/tls`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// File name of the CA certificate. Defaults to `ca.crt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,

    /// File name of the certificate. Defaults to `tls.crt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,

    /// File name of the private key. Defaults to `tls.key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Secret holding the certificate files.
    pub secret: SecretVolumeSource,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    pub name: String,

    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVar>>,
}

/// Probe timings. Every unset field falls back to its default.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// Default 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub initial_delay_seconds: Option<i32>,

    /// Default 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub timeout_seconds: Option<i32>,

    /// Default 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub period_seconds: Option<i32>,

    /// Default 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub success_threshold: Option<i32>,

    /// Default 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub failure_threshold: Option<i32>,
}
