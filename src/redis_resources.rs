// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Redis Kubernetes resource builders
//!
//! This module turns a [`Redis`] specification into the `StatefulSet`, primary
//! `Service` and headless `Service` that run it. Every function is pure: the
//! same specification always produces the same objects, so the reconciler can
//! rebuild them on every pass and compare against what the cluster holds.

use crate::constants::{
    API_GROUP_VERSION, CLUSTER_IP_NONE, DATA_MOUNT_PATH, DEFAULT_ACCESS_MODE,
    DEFAULT_TLS_CA_FILE, DEFAULT_TLS_CERT_FILE, DEFAULT_TLS_KEY_FILE, DEFAULT_VOLUME_MODE,
    ENV_PERSISTENCE_ENABLED,
    EXPORTER_CONTAINER_NAME, EXTERNAL_CONFIG_MOUNT_PATH, EXTERNAL_CONFIG_VOLUME,
    HEADLESS_SERVICE_SUFFIX, KIND_REDIS, PROBE_FAILURE_THRESHOLD, PROBE_INITIAL_DELAY_SECS,
    PROBE_PERIOD_SECS, PROBE_SUCCESS_THRESHOLD, PROBE_TIMEOUT_SECS, PROTOCOL_TCP,
    REDIS_EXPORTER_PORT, REDIS_EXPORTER_PORT_NAME, REDIS_PORT, REDIS_PORT_NAME, ROLE_STANDALONE,
    SERVER_MODE_STANDALONE, STANDALONE_REPLICAS, TLS_ROOT, TLS_VOLUME,
};
use crate::crd::{
    ExistingPasswordSecret, Redis, RedisExporter, ServiceType, Sidecar, Storage, TlsConfig,
};
use crate::labels::{
    ANNOTATION_INSTANCE, ANNOTATION_LAST_APPLIED, ANNOTATION_MANAGED, KUBECTL_LAST_APPLIED,
    LABEL_APP, LABEL_ROLE, LABEL_SETUP_TYPE, MANAGED_VALUE,
};
use k8s_openapi::api::{
    apps::v1::{StatefulSet, StatefulSetSpec},
    core::v1::{
        Affinity, ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource,
        ExecAction, LocalObjectReference, PersistentVolumeClaim, PodSecurityContext, PodSpec,
        PodTemplateSpec, Probe, ResourceRequirements, SecretKeySelector, Service, ServicePort,
        ServiceSpec, Toleration, Volume, VolumeMount,
    },
};
use k8s_openapi::apimachinery::pkg::{
    apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
    util::intstr::IntOrString,
};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ============================================================================
// Naming
// ============================================================================

/// Name of the `StatefulSet` running the instance.
#[must_use]
pub fn statefulset_name(instance_name: &str) -> String {
    instance_name.to_string()
}

/// Name of the primary `Service` clients connect through.
#[must_use]
pub fn service_name(instance_name: &str) -> String {
    instance_name.to_string()
}

/// Name of the headless `Service` that governs the `StatefulSet`.
#[must_use]
pub fn headless_service_name(instance_name: &str) -> String {
    format!("{instance_name}{HEADLESS_SERVICE_SUFFIX}")
}

/// Name of the data volume claim of the first (and only) pod.
///
/// The claim template is named after the instance, and the `StatefulSet`
/// controller names claims `<template>-<statefulset>-<ordinal>`.
#[must_use]
pub fn data_claim_name(instance_name: &str) -> String {
    format!("{instance_name}-{instance_name}-0")
}

// ============================================================================
// Metadata
// ============================================================================

/// Builds the labels stamped on every child of a Redis instance.
///
/// # Arguments
///
/// * `instance_name` - Name of the `Redis` resource
/// * `role` - Role of the pods within the topology (`standalone`)
/// * `user_labels` - Labels from the `Redis` resource; these win on key collisions
///
/// # Returns
///
/// A `BTreeMap` of label key-value pairs
#[must_use]
pub fn build_labels(
    instance_name: &str,
    role: &str,
    user_labels: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP.into(), instance_name.into());
    labels.insert(LABEL_SETUP_TYPE.into(), role.into());
    labels.insert(LABEL_ROLE.into(), role.into());

    if let Some(user_labels) = user_labels {
        labels.extend(user_labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    labels
}

/// Narrows a child's labels to the operator's own keys for use as a pod selector.
///
/// A `StatefulSet` selector is immutable, so user labels stay out of it and
/// can be edited on the `Redis` without stranding the `StatefulSet`.
#[must_use]
pub fn build_selector_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    [LABEL_APP, LABEL_SETUP_TYPE, LABEL_ROLE]
        .into_iter()
        .filter_map(|key| labels.get(key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

/// Builds the annotations stamped on every child of a Redis instance.
///
/// The two operator markers are merged with the user's annotations, then any
/// apply bookkeeping is removed so it never propagates to children.
///
/// # Arguments
///
/// * `instance_name` - Name of the `Redis` resource
/// * `user_annotations` - Annotations from the `Redis` resource
///
/// # Returns
///
/// A `BTreeMap` of annotation key-value pairs
#[must_use]
pub fn build_annotations(
    instance_name: &str,
    user_annotations: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_MANAGED.into(), MANAGED_VALUE.into());
    annotations.insert(ANNOTATION_INSTANCE.into(), instance_name.into());

    if let Some(user_annotations) = user_annotations {
        annotations.extend(
            user_annotations
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    annotations.remove(KUBECTL_LAST_APPLIED);
    annotations.remove(ANNOTATION_LAST_APPLIED);
    annotations
}

/// Builds child metadata from a name and the instance's labels and annotations.
#[must_use]
pub fn build_object_meta(
    name: &str,
    namespace: Option<&str>,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: namespace.map(Into::into),
        labels: Some(labels),
        annotations: Some(annotations),
        ..Default::default()
    }
}

fn instance_meta(redis: &Redis, name: &str) -> ObjectMeta {
    let instance_name = redis.name_any();
    build_object_meta(
        name,
        redis.metadata.namespace.as_deref(),
        build_labels(&instance_name, ROLE_STANDALONE, redis.metadata.labels.as_ref()),
        build_annotations(&instance_name, redis.metadata.annotations.as_ref()),
    )
}

// ============================================================================
// Ownership
// ============================================================================

/// Builds the owner reference pointing a child back at its `Redis`.
///
/// The reference is marked as the controller and blocks owner deletion, so
/// the platform garbage-collects the `StatefulSet` when the `Redis` goes away.
#[must_use]
pub fn build_owner_reference(redis: &Redis) -> OwnerReference {
    OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_REDIS.to_string(),
        name: redis.name_any(),
        uid: redis.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Appends `owner` to the owner references in `meta`.
///
/// Existing references are kept. A reference with the same UID is never added
/// twice, so linking on every pass leaves exactly one back-reference.
///
/// # Returns
///
/// `true` if the reference was appended, `false` if it was already present
pub fn add_owner_reference(meta: &mut ObjectMeta, owner: OwnerReference) -> bool {
    let references = meta.owner_references.get_or_insert_with(Vec::new);
    if references.iter().any(|existing| existing.uid == owner.uid) {
        return false;
    }
    references.push(owner);
    true
}

// ============================================================================
// Parameters
// ============================================================================

/// Pod-level settings of the `StatefulSet`.
#[derive(Clone, Debug, Default)]
pub struct StatefulSetParameters {
    pub replicas: i32,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub security_context: Option<PodSecurityContext>,
    pub priority_class_name: Option<String>,
    pub affinity: Option<Affinity>,
    pub tolerations: Option<Vec<Toleration>>,
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,
    pub volume_claim_template: Option<PersistentVolumeClaim>,
    /// Whether the exporter sidecar runs in the pod.
    pub exporter_enabled: bool,
}

/// Settings of the Redis container and the containers derived from it.
#[derive(Clone, Debug, Default)]
pub struct ContainerParameters {
    /// Name of the Redis container, the instance name.
    pub name: String,
    pub role: String,
    pub image: String,
    pub image_pull_policy: Option<String>,
    pub resources: Option<ResourceRequirements>,
    pub password_secret: Option<ExistingPasswordSecret>,
    /// Name of the data volume claim template, when storage is configured.
    pub data_volume: Option<String>,
    /// Name of the `ConfigMap` with additional Redis configuration.
    pub external_config: Option<String>,
    pub tls: Option<TlsConfig>,
    pub extra_env: Vec<EnvVar>,
    pub readiness_probe: Option<crate::crd::Probe>,
    pub liveness_probe: Option<crate::crd::Probe>,
    /// Exporter settings, present only when the exporter is enabled.
    pub exporter: Option<RedisExporter>,
}

/// Settings of one `Service`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceParameters {
    pub headless: bool,
    pub service_type: ServiceType,
    /// Whether the exporter port is published.
    pub exporter_enabled: bool,
}

fn enabled_exporter(redis: &Redis) -> Option<&RedisExporter> {
    redis.spec.redis_exporter.as_ref().filter(|e| e.enabled)
}

/// Derives the `StatefulSet` parameters of a standalone instance.
#[must_use]
pub fn standalone_statefulset_parameters(redis: &Redis) -> StatefulSetParameters {
    let instance_name = redis.name_any();
    let spec = &redis.spec;

    let volume_claim_template = spec.storage.as_ref().map(|storage| {
        build_volume_claim_template(
            &instance_name,
            build_labels(&instance_name, ROLE_STANDALONE, redis.metadata.labels.as_ref()),
            build_annotations(&instance_name, redis.metadata.annotations.as_ref()),
            storage,
        )
    });

    StatefulSetParameters {
        replicas: STANDALONE_REPLICAS,
        node_selector: spec.node_selector.clone(),
        security_context: spec.security_context.clone(),
        priority_class_name: spec.priority_class_name.clone(),
        affinity: spec.affinity.clone(),
        tolerations: spec.tolerations.clone(),
        image_pull_secrets: spec.kubernetes_config.image_pull_secrets.clone(),
        volume_claim_template,
        exporter_enabled: enabled_exporter(redis).is_some(),
    }
}

/// Derives the container parameters of a standalone instance.
#[must_use]
pub fn standalone_container_parameters(redis: &Redis) -> ContainerParameters {
    let spec = &redis.spec;
    let kubernetes_config = &spec.kubernetes_config;

    ContainerParameters {
        name: redis.name_any(),
        role: SERVER_MODE_STANDALONE.to_string(),
        image: kubernetes_config.image.clone(),
        image_pull_policy: kubernetes_config.image_pull_policy.clone(),
        resources: kubernetes_config.resources.clone(),
        password_secret: kubernetes_config.redis_secret.clone(),
        data_volume: spec.storage.as_ref().map(|_| redis.name_any()),
        external_config: spec
            .redis_config
            .as_ref()
            .and_then(|c| c.additional_redis_config.clone()),
        tls: spec.tls.clone(),
        extra_env: spec.env.clone().unwrap_or_default(),
        readiness_probe: spec.readiness_probe.clone(),
        liveness_probe: spec.liveness_probe.clone(),
        exporter: enabled_exporter(redis).cloned(),
    }
}

/// Derives the parameters of the primary (`headless == false`) or headless `Service`.
#[must_use]
pub fn standalone_service_parameters(redis: &Redis, headless: bool) -> ServiceParameters {
    ServiceParameters {
        headless,
        service_type: if headless {
            ServiceType::ClusterIP
        } else {
            redis.spec.kubernetes_config.service_type.unwrap_or_default()
        },
        exporter_enabled: !headless && enabled_exporter(redis).is_some(),
    }
}

// ============================================================================
// Desired state
// ============================================================================

/// Every child resource a Redis instance needs, freshly built from its spec.
#[derive(Clone, Debug)]
pub struct DesiredResources {
    pub statefulset: StatefulSet,
    pub service: Service,
    pub headless_service: Service,
}

impl DesiredResources {
    /// The data volume claim template, when storage is configured.
    #[must_use]
    pub fn volume_claim_template(&self) -> Option<&PersistentVolumeClaim> {
        self.statefulset
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.as_ref())
            .and_then(|templates| templates.first())
    }
}

/// Builds every child of a standalone Redis instance.
///
/// # Arguments
///
/// * `redis` - The `Redis` resource to build children for
///
/// # Returns
///
/// The desired `StatefulSet`, primary `Service` and headless `Service`. Owner
/// references are not set here; they are linked when the children are applied.
#[must_use]
pub fn build_desired_resources(redis: &Redis) -> DesiredResources {
    let instance_name = redis.name_any();
    debug!(
        name = %instance_name,
        namespace = ?redis.metadata.namespace,
        "Building desired resources for Redis"
    );

    let sidecars = redis.spec.sidecars.as_deref().unwrap_or_default();

    DesiredResources {
        statefulset: build_statefulset(
            instance_meta(redis, &statefulset_name(&instance_name)),
            &standalone_statefulset_parameters(redis),
            &standalone_container_parameters(redis),
            sidecars,
        ),
        service: build_service(
            instance_meta(redis, &service_name(&instance_name)),
            &standalone_service_parameters(redis, false),
        ),
        headless_service: build_service(
            instance_meta(redis, &headless_service_name(&instance_name)),
            &standalone_service_parameters(redis, true),
        ),
    }
}

/// Builds the `StatefulSet` running the Redis container.
///
/// # Arguments
///
/// * `meta` - Metadata of the `StatefulSet`; its operator labels select the pods
/// * `params` - Pod-level settings
/// * `container` - Redis container settings
/// * `sidecars` - Extra containers appended after Redis and the exporter
#[must_use]
pub fn build_statefulset(
    meta: ObjectMeta,
    params: &StatefulSetParameters,
    container: &ContainerParameters,
    sidecars: &[Sidecar],
) -> StatefulSet {
    let labels = meta.labels.clone().unwrap_or_default();
    let instance_name = meta.name.clone().unwrap_or_default();

    let mut containers = vec![build_redis_container(container)];
    if params.exporter_enabled {
        if let Some(exporter) = &container.exporter {
            containers.push(build_exporter_container(exporter, container));
        }
    }
    containers.extend(sidecars.iter().map(build_sidecar_container));

    let volumes = build_volumes(container);

    StatefulSet {
        metadata: meta.clone(),
        spec: Some(StatefulSetSpec {
            replicas: Some(params.replicas),
            service_name: Some(headless_service_name(&instance_name)),
            selector: LabelSelector {
                match_labels: Some(build_selector_labels(&labels)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: meta.annotations,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    volumes: (!volumes.is_empty()).then_some(volumes),
                    node_selector: params.node_selector.clone(),
                    security_context: params.security_context.clone(),
                    priority_class_name: params.priority_class_name.clone(),
                    affinity: params.affinity.clone(),
                    tolerations: params.tolerations.clone(),
                    image_pull_secrets: params.image_pull_secrets.clone(),
                    ..Default::default()
                }),
            },
            volume_claim_templates: params.volume_claim_template.clone().map(|t| vec![t]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the data volume claim template.
///
/// Access modes default to `ReadWriteOnce` and the volume mode to `Filesystem`
/// when the user leaves them unset.
#[must_use]
pub fn build_volume_claim_template(
    instance_name: &str,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    storage: &Storage,
) -> PersistentVolumeClaim {
    let mut template = storage.volume_claim_template.clone();
    template.metadata = build_object_meta(instance_name, None, labels, annotations);
    template.status = None;

    let spec = template.spec.get_or_insert_with(Default::default);
    if spec.access_modes.as_ref().is_none_or(Vec::is_empty) {
        spec.access_modes = Some(vec![DEFAULT_ACCESS_MODE.into()]);
    }
    if spec.volume_mode.is_none() {
        spec.volume_mode = Some(DEFAULT_VOLUME_MODE.into());
    }

    template
}

// ============================================================================
// Containers
// ============================================================================

fn build_redis_container(params: &ContainerParameters) -> Container {
    Container {
        name: params.name.clone(),
        image: Some(params.image.clone()),
        image_pull_policy: params.image_pull_policy.clone(),
        resources: params.resources.clone(),
        ports: Some(vec![ContainerPort {
            name: Some(REDIS_PORT_NAME.into()),
            container_port: REDIS_PORT,
            protocol: Some(PROTOCOL_TCP.into()),
            ..Default::default()
        }]),
        env: Some(build_env_vars(params)),
        volume_mounts: non_empty(build_volume_mounts(params)),
        readiness_probe: Some(build_probe(
            params.readiness_probe.as_ref(),
            params.tls.as_ref(),
        )),
        liveness_probe: Some(build_probe(params.liveness_probe.as_ref(), params.tls.as_ref())),
        ..Default::default()
    }
}

fn build_exporter_container(exporter: &RedisExporter, params: &ContainerParameters) -> Container {
    let volume_mounts = params
        .tls
        .as_ref()
        .map(|_| vec![tls_volume_mount()])
        .unwrap_or_default();

    Container {
        name: EXPORTER_CONTAINER_NAME.into(),
        image: Some(exporter.image.clone()),
        image_pull_policy: exporter.image_pull_policy.clone(),
        resources: exporter.resources.clone(),
        ports: Some(vec![ContainerPort {
            name: Some(REDIS_EXPORTER_PORT_NAME.into()),
            container_port: REDIS_EXPORTER_PORT,
            protocol: Some(PROTOCOL_TCP.into()),
            ..Default::default()
        }]),
        env: Some(build_exporter_env_vars(exporter, params)),
        volume_mounts: non_empty(volume_mounts),
        ..Default::default()
    }
}

fn build_sidecar_container(sidecar: &Sidecar) -> Container {
    Container {
        name: sidecar.name.clone(),
        image: Some(sidecar.image.clone()),
        image_pull_policy: sidecar.image_pull_policy.clone(),
        resources: sidecar.resources.clone(),
        env: sidecar.env.clone().map(sort_env_vars),
        ..Default::default()
    }
}

fn build_probe(probe: Option<&crate::crd::Probe>, tls: Option<&TlsConfig>) -> Probe {
    let probe = probe.cloned().unwrap_or_default();

    let mut command = vec!["redis-cli".to_string()];
    if let Some(tls) = tls {
        let files = TlsFiles::resolve(tls);
        command.extend([
            "--tls".to_string(),
            "--cert".to_string(),
            files.cert,
            "--key".to_string(),
            files.key,
            "--cacert".to_string(),
            files.ca,
        ]);
    }
    command.push("ping".to_string());

    Probe {
        exec: Some(ExecAction {
            command: Some(command),
        }),
        initial_delay_seconds: Some(
            probe
                .initial_delay_seconds
                .unwrap_or(PROBE_INITIAL_DELAY_SECS),
        ),
        timeout_seconds: Some(probe.timeout_seconds.unwrap_or(PROBE_TIMEOUT_SECS)),
        period_seconds: Some(probe.period_seconds.unwrap_or(PROBE_PERIOD_SECS)),
        success_threshold: Some(probe.success_threshold.unwrap_or(PROBE_SUCCESS_THRESHOLD)),
        failure_threshold: Some(probe.failure_threshold.unwrap_or(PROBE_FAILURE_THRESHOLD)),
        ..Default::default()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

// ============================================================================
// Environment
// ============================================================================

/// Absolute paths of the TLS files inside the pod.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TlsFiles {
    ca: String,
    cert: String,
    key: String,
}

impl TlsFiles {
    fn resolve(tls: &TlsConfig) -> Self {
        Self {
            ca: tls_path(tls.ca.as_deref(), DEFAULT_TLS_CA_FILE),
            cert: tls_path(tls.cert.as_deref(), DEFAULT_TLS_CERT_FILE),
            key: tls_path(tls.key.as_deref(), DEFAULT_TLS_KEY_FILE),
        }
    }
}

fn tls_path(file: Option<&str>, default: &str) -> String {
    let file = file
        .map(|f| f.trim_start_matches('/'))
        .filter(|f| !f.is_empty())
        .unwrap_or(default);
    format!("{TLS_ROOT}/{file}")
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn password_env_var(secret: &ExistingPasswordSecret) -> EnvVar {
    EnvVar {
        name: "REDIS_PASSWORD".into(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.name.clone(),
                key: secret.key.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn redis_addr(tls: bool) -> String {
    let scheme = if tls { "rediss" } else { "redis" };
    format!("{scheme}://localhost:{REDIS_PORT}")
}

/// Sorts environment variables by name, keeping the relative order of duplicates.
#[must_use]
pub fn sort_env_vars(mut env: Vec<EnvVar>) -> Vec<EnvVar> {
    env.sort_by(|a, b| a.name.cmp(&b.name));
    env
}

/// Appends `extra` to `env`; an extra replaces any entry of the same name.
fn merge_env_vars(env: &mut Vec<EnvVar>, extra: impl IntoIterator<Item = EnvVar>) {
    for var in extra {
        env.retain(|existing| existing.name != var.name);
        env.push(var);
    }
}

/// Builds the Redis container's environment.
///
/// The list always carries `SERVER_MODE`, `SETUP_MODE` and `REDIS_ADDR`, then
/// the TLS, password and persistence variables when those features are
/// configured. The user's extras are merged last and override operator
/// variables of the same name. The result is sorted by name so that
/// identical specifications always produce identical pod templates.
#[must_use]
pub fn build_env_vars(params: &ContainerParameters) -> Vec<EnvVar> {
    let mut env = vec![
        env_var("SERVER_MODE", params.role.clone()),
        env_var("SETUP_MODE", params.role.clone()),
        env_var("REDIS_ADDR", redis_addr(params.tls.is_some())),
    ];

    if let Some(tls) = &params.tls {
        let files = TlsFiles::resolve(tls);
        env.push(env_var("TLS_MODE", "true"));
        env.push(env_var("REDIS_TLS_CA_KEY", files.ca));
        env.push(env_var("REDIS_TLS_CERT", files.cert));
        env.push(env_var("REDIS_TLS_CERT_KEY", files.key));
    }

    if let Some(secret) = &params.password_secret {
        env.push(password_env_var(secret));
    }

    if params.data_volume.is_some() {
        env.push(env_var(ENV_PERSISTENCE_ENABLED, "true"));
    }

    merge_env_vars(&mut env, params.extra_env.iter().cloned());

    sort_env_vars(env)
}

fn build_exporter_env_vars(exporter: &RedisExporter, params: &ContainerParameters) -> Vec<EnvVar> {
    let mut env = vec![env_var("REDIS_ADDR", redis_addr(params.tls.is_some()))];

    if let Some(tls) = &params.tls {
        let files = TlsFiles::resolve(tls);
        env.push(env_var("REDIS_EXPORTER_TLS_CLIENT_KEY_FILE", files.key));
        env.push(env_var("REDIS_EXPORTER_TLS_CLIENT_CERT_FILE", files.cert));
        env.push(env_var("REDIS_EXPORTER_TLS_CA_CERT_FILE", files.ca));
        env.push(env_var("REDIS_EXPORTER_SKIP_TLS_VERIFICATION", "true"));
    }

    if let Some(secret) = &params.password_secret {
        env.push(password_env_var(secret));
    }

    merge_env_vars(&mut env, exporter.env.iter().flatten().cloned());

    sort_env_vars(env)
}

// ============================================================================
// Volumes
// ============================================================================

fn tls_volume_mount() -> VolumeMount {
    VolumeMount {
        name: TLS_VOLUME.into(),
        mount_path: TLS_ROOT.into(),
        read_only: Some(true),
        ..Default::default()
    }
}

fn build_volume_mounts(params: &ContainerParameters) -> Vec<VolumeMount> {
    let mut mounts = Vec::new();

    if let Some(data_volume) = &params.data_volume {
        mounts.push(VolumeMount {
            name: data_volume.clone(),
            mount_path: DATA_MOUNT_PATH.into(),
            ..Default::default()
        });
    }

    if params.external_config.is_some() {
        mounts.push(VolumeMount {
            name: EXTERNAL_CONFIG_VOLUME.into(),
            mount_path: EXTERNAL_CONFIG_MOUNT_PATH.into(),
            ..Default::default()
        });
    }

    if params.tls.is_some() {
        mounts.push(tls_volume_mount());
    }

    mounts
}

fn build_volumes(params: &ContainerParameters) -> Vec<Volume> {
    let mut volumes = Vec::new();

    if let Some(config_map) = &params.external_config {
        volumes.push(Volume {
            name: EXTERNAL_CONFIG_VOLUME.into(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map.clone(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    if let Some(tls) = &params.tls {
        volumes.push(Volume {
            name: TLS_VOLUME.into(),
            secret: Some(tls.secret.clone()),
            ..Default::default()
        });
    }

    volumes
}

/// Removes container volume mounts that no pod volume or claim template backs.
///
/// Losing the data mount also removes `PERSISTENCE_ENABLED` from that
/// container, so the pod never claims persistence it does not have.
///
/// # Returns
///
/// The names of the removed mounts
pub fn drop_unbacked_volume_mounts(statefulset: &mut StatefulSet) -> Vec<String> {
    let Some(spec) = statefulset.spec.as_mut() else {
        return Vec::new();
    };

    let mut backed: BTreeSet<String> = spec
        .volume_claim_templates
        .iter()
        .flatten()
        .filter_map(|template| template.metadata.name.clone())
        .collect();
    let Some(pod) = spec.template.spec.as_mut() else {
        return Vec::new();
    };
    backed.extend(pod.volumes.iter().flatten().map(|volume| volume.name.clone()));

    let mut dropped = Vec::new();
    for container in &mut pod.containers {
        let Some(mounts) = container.volume_mounts.as_mut() else {
            continue;
        };

        let mut lost_data = false;
        mounts.retain(|mount| {
            if backed.contains(&mount.name) {
                return true;
            }
            lost_data |= mount.mount_path == DATA_MOUNT_PATH;
            dropped.push(mount.name.clone());
            false
        });
        if mounts.is_empty() {
            container.volume_mounts = None;
        }

        if lost_data {
            if let Some(env) = container.env.as_mut() {
                env.retain(|var| var.name != ENV_PERSISTENCE_ENABLED);
            }
        }
    }

    dropped
}

// ============================================================================
// Services
// ============================================================================

/// Builds a `Service` selecting the instance's pods.
///
/// The Redis port is always published. The exporter port is added only when
/// `params.exporter_enabled` is set, which is never the case for the headless
/// service.
#[must_use]
pub fn build_service(meta: ObjectMeta, params: &ServiceParameters) -> Service {
    let mut ports = vec![ServicePort {
        name: Some(REDIS_PORT_NAME.into()),
        port: REDIS_PORT,
        target_port: Some(IntOrString::Int(REDIS_PORT)),
        protocol: Some(PROTOCOL_TCP.into()),
        ..Default::default()
    }];

    if params.exporter_enabled && !params.headless {
        ports.push(ServicePort {
            name: Some(REDIS_EXPORTER_PORT_NAME.into()),
            port: REDIS_EXPORTER_PORT,
            target_port: Some(IntOrString::Int(REDIS_EXPORTER_PORT)),
            protocol: Some(PROTOCOL_TCP.into()),
            ..Default::default()
        });
    }

    let selector = meta.labels.as_ref().map(build_selector_labels);

    Service {
        metadata: meta,
        spec: Some(ServiceSpec {
            type_: Some(params.service_type.as_str().into()),
            cluster_ip: params.headless.then(|| CLUSTER_IP_NONE.into()),
            selector,
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "redis_resources_tests.rs"]
mod redis_resources_tests;
