// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for cluster object store operations.
//!
//! Every read or write the reconciler performs against the cluster maps its
//! failure onto [`StoreError`]. The variants decide how a reconciliation pass
//! reacts: `NotFound` drives creation or is tolerated during cleanup,
//! `Unprocessable` skips the offending child, and `Conflict` or `Transport`
//! abort the pass so the controller retries it later.

use thiserror::Error;

/// Failure of a single cluster object store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The write raced with another writer (stale resource version or already exists).
    #[error("Conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    /// The platform rejected the object, e.g. a change to an immutable field.
    #[error("{kind} {namespace}/{name} rejected as invalid: {message}")]
    Unprocessable {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    /// Any other failure talking to the cluster.
    #[error("Failed to reach the cluster for {kind} {namespace}/{name}: {message}")]
    Transport {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
}

impl StoreError {
    /// Maps a kube client error onto the store taxonomy.
    ///
    /// HTTP 404 becomes `NotFound`, 409 `Conflict`, 400 and 422 `Unprocessable`;
    /// everything else, including connection failures, is `Transport`.
    #[must_use]
    pub fn from_kube(error: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        let (kind, namespace, name) = (kind.to_string(), namespace.to_string(), name.to_string());
        let message = error.to_string();

        match error {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind,
                namespace,
                name,
            },
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind,
                namespace,
                name,
                message,
            },
            kube::Error::Api(ae) if ae.code == 400 || ae.code == 422 => Self::Unprocessable {
                kind,
                namespace,
                name,
                message,
            },
            _ => Self::Transport {
                kind,
                namespace,
                name,
                message,
            },
        }
    }

    /// Builds an `Unprocessable` error for an object that could not be encoded.
    #[must_use]
    pub fn invalid_object(kind: &str, namespace: &str, name: &str, error: &serde_json::Error) -> Self {
        Self::Unprocessable {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a reconciliation pass should stop at this error.
    ///
    /// `Unprocessable` only affects the child that was rejected; the pass moves
    /// on to the next one.
    #[must_use]
    pub fn aborts_pass(&self) -> bool {
        !matches!(self, Self::Unprocessable { .. })
    }

    /// Short label for metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unprocessable { .. } => "unprocessable",
            Self::Transport { .. } => "transport",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
