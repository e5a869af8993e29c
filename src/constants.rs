// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Redis operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the Redis CRD
pub const API_GROUP: &str = "redis.firestoned.io";

/// API version for the Redis CRD
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "redis.firestoned.io/v1alpha1";

/// Kind name for the `Redis` resource
pub const KIND_REDIS: &str = "Redis";

// ============================================================================
// Redis Protocol Constants
// ============================================================================

/// Port the Redis server listens on
pub const REDIS_PORT: i32 = 6379;

/// Port the Prometheus exporter sidecar listens on
pub const REDIS_EXPORTER_PORT: i32 = 9121;

/// Name of the Redis client port on containers and services
pub const REDIS_PORT_NAME: &str = "redis-client";

/// Name of the exporter port on containers and services
pub const REDIS_EXPORTER_PORT_NAME: &str = "redis-exporter";

/// Transport protocol for both ports
pub const PROTOCOL_TCP: &str = "TCP";

// ============================================================================
// Topology Constants
// ============================================================================

/// Role label value for a single-instance deployment
pub const ROLE_STANDALONE: &str = "standalone";

/// Server mode value passed to the Redis image
pub const SERVER_MODE_STANDALONE: &str = "standalone";

/// Replica count of a standalone `StatefulSet`
pub const STANDALONE_REPLICAS: i32 = 1;

/// Suffix appended to the instance name for the headless service
pub const HEADLESS_SERVICE_SUFFIX: &str = "-headless";

/// Cluster IP value that marks a service as headless
pub const CLUSTER_IP_NONE: &str = "None";

// ============================================================================
// Container Constants
// ============================================================================

/// Name of the exporter sidecar container
pub const EXPORTER_CONTAINER_NAME: &str = "redis-exporter";

/// Mount path of the persistent data volume
pub const DATA_MOUNT_PATH: &str = "/data";

/// Environment variable telling the Redis image that `/data` is persistent
pub const ENV_PERSISTENCE_ENABLED: &str = "PERSISTENCE_ENABLED";

/// Volume name of the external configuration `ConfigMap`
pub const EXTERNAL_CONFIG_VOLUME: &str = "external-config";

/// Mount path of the external configuration `ConfigMap`
pub const EXTERNAL_CONFIG_MOUNT_PATH: &str = "/etc/redis/external.conf.d";

/// Volume name of the TLS certificate secret
pub const TLS_VOLUME: &str = "tls-certs";

/// Root directory the TLS secret is mounted under
pub const TLS_ROOT: &str = "/tls";

/// Default file name of the CA certificate within the TLS secret
pub const DEFAULT_TLS_CA_FILE: &str = "ca.crt";

/// Default file name of the certificate within the TLS secret
pub const DEFAULT_TLS_CERT_FILE: &str = "tls.crt";

/// Default file name of the private key within the TLS secret
pub const DEFAULT_TLS_KEY_FILE: &str = "tls.key";

/// Default access mode of the data volume claim template
pub const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";

/// Default volume mode of the data volume claim template
pub const DEFAULT_VOLUME_MODE: &str = "Filesystem";

// ============================================================================
// Probe Defaults
// ============================================================================

/// Seconds before the first probe runs
pub const PROBE_INITIAL_DELAY_SECS: i32 = 1;

/// Seconds after which a probe times out
pub const PROBE_TIMEOUT_SECS: i32 = 1;

/// Seconds between probes
pub const PROBE_PERIOD_SECS: i32 = 10;

/// Consecutive successes required after a failure
pub const PROBE_SUCCESS_THRESHOLD: i32 = 1;

/// Consecutive failures before the container is considered unhealthy
pub const PROBE_FAILURE_THRESHOLD: i32 = 3;

// ============================================================================
// Controller Constants
// ============================================================================

/// Seconds between periodic reconciliation passes
pub const DEFAULT_REQUEUE_INTERVAL_SECS: u64 = 10;

/// Seconds to wait before retrying a failed reconciliation pass
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 30;

/// Address the metrics endpoint binds to
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
