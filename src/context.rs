// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the Redis controller.
//!
//! The controller receives an `Arc<Context>` that contains:
//! - The cluster object store the reconcilers read and write through
//! - The operator configuration read from the environment at startup
//!
//! # Environment
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `WATCH_NAMESPACE` | all namespaces | Restrict the controller to one namespace |
//! | `REQUEUE_INTERVAL_SECS` | `10` | Delay before re-checking a synced `Redis` |
//! | `ERROR_REQUEUE_SECS` | `30` | Delay before retrying a failed pass |
//! | `METRICS_BIND_ADDRESS` | `0.0.0.0:8080` | Listen address of `/metrics` and `/healthz` |

use crate::constants::{
    DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_REQUEUE_INTERVAL_SECS,
};
use crate::reconcilers::KubeStore;
use anyhow::{Context as _, Result};
use kube::Client;
use std::net::SocketAddr;
use std::time::Duration;

pub const ENV_WATCH_NAMESPACE: &str = "WATCH_NAMESPACE";
pub const ENV_REQUEUE_INTERVAL_SECS: &str = "REQUEUE_INTERVAL_SECS";
pub const ENV_ERROR_REQUEUE_SECS: &str = "ERROR_REQUEUE_SECS";
pub const ENV_METRICS_BIND_ADDRESS: &str = "METRICS_BIND_ADDRESS";

/// Operator settings read once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches every namespace.
    pub watch_namespace: Option<String>,
    /// Delay before a synced `Redis` is checked again.
    pub requeue_interval: Duration,
    /// Delay before a failed pass is retried.
    pub error_requeue_interval: Duration,
    /// Listen address of the metrics and health endpoints.
    pub metrics_bind_address: SocketAddr,
}

impl OperatorConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            get(key).map_or(Ok(Duration::from_secs(default)), |value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{key} must be a whole number of seconds, got {value:?}"))
            })
        };

        let metrics_bind_address = get(ENV_METRICS_BIND_ADDRESS)
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());
        let metrics_bind_address = metrics_bind_address
            .trim()
            .parse()
            .with_context(|| {
                format!("{ENV_METRICS_BIND_ADDRESS} must be a socket address, got {metrics_bind_address:?}")
            })?;

        Ok(Self {
            watch_namespace: get(ENV_WATCH_NAMESPACE).map(|ns| ns.trim().to_string()),
            requeue_interval: seconds(ENV_REQUEUE_INTERVAL_SECS, DEFAULT_REQUEUE_INTERVAL_SECS)?,
            error_requeue_interval: seconds(ENV_ERROR_REQUEUE_SECS, DEFAULT_ERROR_REQUEUE_SECS)?,
            metrics_bind_address,
        })
    }
}

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    /// Cluster object store for API operations
    pub store: KubeStore,

    /// Operator configuration
    pub config: OperatorConfig,
}

impl Context {
    #[must_use]
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            store: KubeStore::new(client),
            config,
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
