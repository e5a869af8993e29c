// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines the labels that select a Redis instance's pods and the
//! annotations and finalizer the operator stamps on the resources it owns.

// ============================================================================
// Labels
// ============================================================================

/// Label carrying the instance name
pub const LABEL_APP: &str = "app";

/// Label carrying the topology the instance runs as
pub const LABEL_SETUP_TYPE: &str = "redis_setup_type";

/// Label carrying the role a pod plays within the topology
pub const LABEL_ROLE: &str = "role";

// ============================================================================
// Annotations
// ============================================================================

/// Marks a resource as managed by this operator
pub const ANNOTATION_MANAGED: &str = "redis.firestoned.io/managed";

/// Value of [`ANNOTATION_MANAGED`]
pub const MANAGED_VALUE: &str = "true";

/// Names the Redis instance a resource belongs to
pub const ANNOTATION_INSTANCE: &str = "redis.firestoned.io/instance";

/// Last desired definition the operator applied to a child resource
pub const ANNOTATION_LAST_APPLIED: &str = "redis.firestoned.io/last-applied";

/// Client-side apply bookkeeping that must never be copied onto children
pub const KUBECTL_LAST_APPLIED: &str = "kubectl.kubernetes.io/last-applied-configuration";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer guarding cleanup of a Redis instance's children
pub const FINALIZER_REDIS: &str = "redis.firestoned.io/finalizer";
