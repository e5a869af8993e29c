// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<OperatorConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        OperatorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.requeue_interval, Duration::from_secs(10));
        assert_eq!(config.error_requeue_interval, Duration::from_secs(30));
        assert_eq!(
            config.metrics_bind_address,
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            (ENV_WATCH_NAMESPACE, "redis-system"),
            (ENV_REQUEUE_INTERVAL_SECS, "60"),
            (ENV_ERROR_REQUEUE_SECS, " 5 "),
            (ENV_METRICS_BIND_ADDRESS, "127.0.0.1:9090"),
        ])
        .unwrap();

        assert_eq!(config.watch_namespace.as_deref(), Some("redis-system"));
        assert_eq!(config.requeue_interval, Duration::from_secs(60));
        assert_eq!(config.error_requeue_interval, Duration::from_secs(5));
        assert_eq!(
            config.metrics_bind_address,
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[(ENV_WATCH_NAMESPACE, ""), (ENV_REQUEUE_INTERVAL_SECS, "  ")])
            .unwrap();

        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.requeue_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let err = config_from(&[(ENV_REQUEUE_INTERVAL_SECS, "ten")]).unwrap_err();

        assert!(err.to_string().contains(ENV_REQUEUE_INTERVAL_SECS));
    }

    #[test]
    fn test_negative_interval_is_rejected() {
        assert!(config_from(&[(ENV_ERROR_REQUEUE_SECS, "-1")]).is_err());
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let err = config_from(&[(ENV_METRICS_BIND_ADDRESS, "localhost")]).unwrap_err();

        assert!(err.to_string().contains(ENV_METRICS_BIND_ADDRESS));
    }
}
