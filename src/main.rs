// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use certer::{
    cluster::KubeClusterApi,
    config::Cli,
    constants::{
        ERROR_REQUEUE_DURATION_SECS, HEALTH_SERVER_PATH, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    context::Context,
    issuer::{build_issuer, VaultClient},
    metrics::gather_metrics,
    reconcilers::ReconcileOutcome,
};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, Client, ResourceExt,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] certer::tls_errors::ReconcileError);

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("certer-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();

    info!("Starting certer Ingress TLS controller");
    debug!(config = ?cli, "Loaded configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let vault = VaultClient::new(cli.vault_config()).context("Invalid Vault configuration")?;
    info!(
        vault_addr = vault.addr(),
        issuer_mode = %cli.issuer_mode,
        "Certificate issuer configured"
    );
    let issuer = build_issuer(cli.issuer_mode, vault);

    let ctx = Arc::new(Context::new(
        Arc::new(KubeClusterApi::new(client.clone())),
        issuer,
        cli.reconcile_config(),
        cli.requeue_interval(),
    ));

    // The controller and the metrics server should never exit on their own
    tokio::select! {
        result = run_ingress_controller(client, cli.watch_namespace(), ctx) => {
            error!("CRITICAL: Ingress controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Ingress controller exited unexpectedly without error")
        }
        result = run_metrics_server(cli.metrics_addr) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received, stopping controller");
            Ok(())
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

/// Run the Ingress controller
async fn run_ingress_controller(
    client: Client,
    namespace: Option<&str>,
    ctx: Arc<Context>,
) -> Result<()> {
    let api = match namespace {
        Some(ns) => {
            info!(namespace = ns, "Starting Ingress controller for one namespace");
            Api::<Ingress>::namespaced(client, ns)
        }
        None => {
            info!("Starting Ingress controller with cluster-wide watch");
            Api::<Ingress>::all(client)
        }
    };

    Controller::new(api, Config::default())
        .run(reconcile_ingress_wrapper, error_policy, ctx)
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

/// Reconcile wrapper for `Ingress`
async fn reconcile_ingress_wrapper(
    ingress: Arc<Ingress>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    debug!(
        ingress = %ingress.name_any(),
        namespace = ?ingress.namespace(),
        "Reconcile wrapper called for Ingress"
    );

    match ctx.reconcile(&ingress).await {
        Ok(outcome) => {
            let requeue = ctx.requeue_after(&outcome);
            match &outcome {
                ReconcileOutcome::NothingToDo => {}
                ReconcileOutcome::Reconciled(report) if report.is_complete() => {
                    info!(
                        ingress = %ingress.name_any(),
                        issued = report.issued,
                        skipped = report.skipped,
                        "Successfully reconciled Ingress"
                    );
                }
                ReconcileOutcome::Reconciled(report) => {
                    warn!(
                        ingress = %ingress.name_any(),
                        failed = report.failures.len(),
                        requeue_after = ?requeue,
                        "Reconciled Ingress with host failures"
                    );
                }
            }
            Ok(Action::requeue(requeue))
        }
        Err(e) => {
            error!(ingress = %ingress.name_any(), error = %e, "Failed to reconcile Ingress");
            Err(e.into())
        }
    }
}

/// Error policy for the Ingress controller
fn error_policy(_resource: Arc<Ingress>, _err: &ReconcileError, _ctx: Arc<Context>) -> Action {
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

fn metrics_router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(HEALTH_SERVER_PATH, get(health_handler))
}

/// Serve `/metrics` and `/healthz`
async fn run_metrics_server(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;
    info!(addr = %addr, "Metrics server listening");

    axum::serve(listener, metrics_router())
        .await
        .context("Metrics server failed")
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
