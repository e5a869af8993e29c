// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use redis_operator::{
    constants::{KIND_REDIS, TOKIO_WORKER_THREADS},
    context::{Context, OperatorConfig},
    crd::Redis,
    metrics,
    reconcilers::{reconcile_redis, PassOutcome},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("redis-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_tracing();

    info!("Starting Redis Controller");
    debug!("Logging initialized with file and line number tracking");

    let config = OperatorConfig::from_env()?;
    debug!(config = ?config, "Operator configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::new(client.clone(), config.clone()));

    // The controller stops cleanly on SIGTERM/SIGINT; the metrics server only
    // returns if it fails.
    tokio::select! {
        result = run_redis_controller(client, ctx) => {
            result?;
            info!("Redis controller stopped");
            Ok(())
        }
        result = run_metrics_server(config.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
    }
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Scopes an API to the watched namespace, or to the whole cluster.
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the `Redis` controller
async fn run_redis_controller(client: Client, ctx: Arc<Context>) -> Result<()> {
    let namespace = ctx.config.watch_namespace.as_deref();
    info!(
        namespace = namespace.unwrap_or("<all>"),
        "Starting Redis controller"
    );

    let api = scoped_api::<Redis>(&client, namespace);
    let statefulsets = scoped_api::<StatefulSet>(&client, namespace);
    let services = scoped_api::<Service>(&client, namespace);

    Controller::new(api, Config::default())
        .owns(statefulsets, Config::default())
        .owns(services, Config::default())
        .shutdown_on_signal()
        .run(reconcile_redis_wrapper, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((object, _)) => debug!(name = %object.name, "Reconciled Redis"),
                Err(e) => debug!("Redis reconcile event: {}", e),
            }
            futures::future::ready(())
        })
        .await;

    Ok(())
}

/// Reconcile wrapper for `Redis`
async fn reconcile_redis_wrapper(
    redis: Arc<Redis>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = redis.namespace().unwrap_or_default();
    let name = redis.name_any();

    debug!(
        name = %name,
        namespace = %namespace,
        "Reconcile wrapper called for Redis"
    );

    match reconcile_redis(&ctx.store, &namespace, &name).await {
        Ok(outcome) => {
            metrics::record_reconciliation_success(KIND_REDIS, start.elapsed());
            if let PassOutcome::Synced(report) = &outcome {
                if !report.skipped.is_empty() {
                    warn!(
                        "Redis {}/{} reconciled with {} unprocessable children",
                        namespace,
                        name,
                        report.skipped.len()
                    );
                }
            }
            Ok(requeue_action(&outcome, &ctx.config))
        }
        Err(e) => {
            error!("Failed to reconcile Redis {}/{}: {:#}", namespace, name, e);
            metrics::record_reconciliation_error(KIND_REDIS, start.elapsed());
            Err(e.into())
        }
    }
}

/// Decides when a finished pass runs again.
///
/// A live instance is re-checked periodically so drift introduced behind the
/// operator's back is repaired. A finalized or vanished instance waits for
/// the next change.
fn requeue_action(outcome: &PassOutcome, config: &OperatorConfig) -> Action {
    match outcome {
        PassOutcome::Synced(_) => {
            metrics::record_reconciliation_requeue(KIND_REDIS, "periodic");
            Action::requeue(config.requeue_interval)
        }
        PassOutcome::Finalized | PassOutcome::Gone => Action::await_change(),
    }
}

/// Error policy for the `Redis` controller
fn error_policy(redis: Arc<Redis>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    warn!(
        name = %redis.name_any(),
        namespace = ?redis.namespace(),
        error = %err,
        "Requeueing Redis after error"
    );
    error_action(&ctx.config)
}

fn error_action(config: &OperatorConfig) -> Action {
    metrics::record_reconciliation_requeue(KIND_REDIS, "error");
    Action::requeue(config.error_requeue_interval)
}

fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Serve `/metrics` and `/healthz`
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    axum::serve(listener, metrics_router()).await?;
    Ok(())
}
