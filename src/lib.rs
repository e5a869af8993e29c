// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Redis Operator for Kubernetes
//!
//! A Kubernetes operator written in Rust that runs standalone Redis instances
//! declared through the `Redis` Custom Resource Definition.
//!
//! ## Overview
//!
//! For every `Redis` resource the operator maintains:
//!
//! - A single-replica `StatefulSet` running Redis, optionally with the
//!   Prometheus exporter and user sidecars
//! - A headless `Service` governing the `StatefulSet`
//! - A primary `Service` clients connect through
//!
//! Children are rebuilt from the `Redis` definition on every pass and written only when
//! they have drifted. A finalizer guarantees the Services and the data volume
//! claim are removed before the `Redis` itself goes away.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition for `Redis`
//! - [`redis_resources`] - Builders for the desired child resources
//! - [`reconcilers`] - Reconciliation pass, diff-and-apply, finalizers
//! - [`context`] - Controller context and operator configuration
//! - [`errors`] - Cluster store error taxonomy
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use redis_operator::crd::{KubernetesConfig, Redis, RedisSpec};
//! use redis_operator::redis_resources::build_desired_resources;
//!
//! let redis = Redis::new(
//!     "cache",
//!     RedisSpec {
//!         kubernetes_config: KubernetesConfig {
//!             image: "quay.io/opstree/redis:v7.0.12".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     },
//! );
//!
//! let desired = build_desired_resources(&redis);
//! assert_eq!(desired.headless_service.metadata.name.as_deref(), Some("cache-headless"));
//! ```

pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod redis_resources;

#[cfg(test)]
mod crd_tests;
