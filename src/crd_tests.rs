// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::{CustomResourceExt, Resource};
    use serde_json::json;

    #[test]
    fn test_minimal_spec_deserializes_with_defaults() {
        let spec: RedisSpec = serde_json::from_value(json!({
            "kubernetesConfig": { "image": "quay.io/opstree/redis:v7.0.12" }
        }))
        .unwrap();

        assert_eq!(spec.kubernetes_config.image, "quay.io/opstree/redis:v7.0.12");
        assert!(spec.kubernetes_config.service_type.is_none());
        assert!(spec.storage.is_none());
        assert!(spec.redis_exporter.is_none());
        assert!(spec.tls.is_none());
        assert!(spec.sidecars.is_none());
    }

    #[test]
    fn test_minimal_spec_serializes_without_unset_fields() {
        let spec = RedisSpec {
            kubernetes_config: KubernetesConfig {
                image: "redis:7".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({ "kubernetesConfig": { "image": "redis:7" } })
        );
    }

    #[test]
    fn test_service_type() {
        assert_eq!(ServiceType::default(), ServiceType::ClusterIP);
        assert_eq!(ServiceType::ClusterIP.as_str(), "ClusterIP");
        assert_eq!(ServiceType::NodePort.as_str(), "NodePort");
        assert_eq!(ServiceType::LoadBalancer.as_str(), "LoadBalancer");

        let parsed: ServiceType = serde_json::from_value(json!("LoadBalancer")).unwrap();
        assert_eq!(parsed, ServiceType::LoadBalancer);
        assert!(serde_json::from_value::<ServiceType>(json!("ExternalName")).is_err());
    }

    #[test]
    fn test_password_secret_requires_name_and_key() {
        let secret: ExistingPasswordSecret =
            serde_json::from_value(json!({ "name": "redis-auth", "key": "password" })).unwrap();
        assert_eq!(secret.name, "redis-auth");
        assert_eq!(secret.key, "password");

        assert!(serde_json::from_value::<ExistingPasswordSecret>(json!({ "name": "redis-auth" })).is_err());
    }

    #[test]
    fn test_full_spec_deserializes() {
        let spec: RedisSpec = serde_json::from_value(json!({
            "kubernetesConfig": {
                "image": "quay.io/opstree/redis:v7.0.12",
                "imagePullPolicy": "IfNotPresent",
                "redisSecret": { "name": "redis-auth", "key": "password" },
                "serviceType": "NodePort"
            },
            "redisConfig": { "additionalRedisConfig": "redis-extra" },
            "storage": {
                "volumeClaimTemplate": {
                    "spec": { "resources": { "requests": { "storage": "1Gi" } } }
                }
            },
            "redisExporter": { "enabled": true, "image": "quay.io/opstree/redis-exporter:v1.44.0" },
            "tls": { "ca": "root.pem", "secret": { "secretName": "redis-tls" } },
            "sidecars": [{ "name": "log-shipper", "image": "fluent/fluent-bit:2.2" }],
            "readinessProbe": { "periodSeconds": 5 },
            "priorityClassName": "critical"
        }))
        .unwrap();

        assert_eq!(spec.kubernetes_config.service_type, Some(ServiceType::NodePort));
        assert_eq!(
            spec.redis_config.unwrap().additional_redis_config.as_deref(),
            Some("redis-extra")
        );
        assert!(spec.redis_exporter.unwrap().enabled);
        assert_eq!(spec.tls.unwrap().ca.as_deref(), Some("root.pem"));
        assert_eq!(spec.sidecars.unwrap()[0].name, "log-shipper");
        assert_eq!(spec.readiness_probe.unwrap().period_seconds, Some(5));
        assert_eq!(spec.priority_class_name.as_deref(), Some("critical"));
    }

    #[test]
    fn test_resource_identity() {
        assert_eq!(Redis::group(&()), "redis.firestoned.io");
        assert_eq!(Redis::version(&()), "v1alpha1");
        assert_eq!(Redis::kind(&()), "Redis");
        assert_eq!(Redis::api_version(&()), "redis.firestoned.io/v1alpha1");
    }

    #[test]
    fn test_crd_definition() {
        let crd = Redis::crd();

        assert_eq!(crd.metadata.name.as_deref(), Some("redis.redis.firestoned.io"));
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(
            crd.spec.names.short_names,
            Some(vec!["rds".to_string()])
        );
        assert_eq!(crd.spec.versions.len(), 1);
        assert!(crd.spec.versions[0]
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_none());
    }
}
