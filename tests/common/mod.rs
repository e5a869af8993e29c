// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use serde_json::json;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {}", e);
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "redis-operator-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
