// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the Ingress controller.
//!
//! Every reconciliation receives an `Arc<Context>` that contains:
//! - the cluster collaborator used to read and write Ingresses and secrets
//! - the certificate issuer selected at startup
//! - the per-pass reconciliation settings
//!
//! The context also owns the bookkeeping around a pass: metrics and the requeue interval.

use crate::cluster::ClusterApi;
use crate::constants::ERROR_REQUEUE_DURATION_SECS;
use crate::issuer::CertificateIssuer;
use crate::metrics::{self, PassOutcome};
use crate::reconcilers::{reconcile_ingress, ReconcileConfig, ReconcileOutcome};
use crate::tls_errors::ReconcileError;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared context passed to every reconciliation.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes operations
    pub cluster: Arc<dyn ClusterApi>,

    /// Certificate authority
    pub issuer: Arc<dyn CertificateIssuer>,

    /// Per-pass settings
    pub config: ReconcileConfig,

    /// Requeue interval after a clean pass; expiry is only noticed when a pass runs
    pub requeue_interval: Duration,
}

impl Context {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        issuer: Arc<dyn CertificateIssuer>,
        config: ReconcileConfig,
        requeue_interval: Duration,
    ) -> Self {
        Self {
            cluster,
            issuer,
            config,
            requeue_interval,
        }
    }

    /// Run one pass over `ingress` and record its outcome and duration.
    ///
    /// # Errors
    ///
    /// Returns the pass-scoped error of [`reconcile_ingress`].
    pub async fn reconcile(&self, ingress: &Ingress) -> Result<ReconcileOutcome, ReconcileError> {
        let start = Instant::now();
        let result = reconcile_ingress(
            self.cluster.as_ref(),
            self.issuer.as_ref(),
            &self.config,
            ingress,
        )
        .await;

        metrics::record_reconciliation(pass_outcome(&result), start.elapsed());
        result
    }

    /// When to look at the Ingress again after `outcome`.
    ///
    /// Hosts that failed are dropped from the TLS list and re-added by the next pass, so
    /// partial passes come back as quickly as failed ones.
    #[must_use]
    pub fn requeue_after(&self, outcome: &ReconcileOutcome) -> Duration {
        match outcome {
            ReconcileOutcome::Reconciled(report) if !report.is_complete() => {
                Duration::from_secs(ERROR_REQUEUE_DURATION_SECS)
            }
            _ => self.requeue_interval,
        }
    }
}

/// Metrics label for the result of a pass.
#[must_use]
pub fn pass_outcome(result: &Result<ReconcileOutcome, ReconcileError>) -> PassOutcome {
    match result {
        Ok(ReconcileOutcome::NothingToDo) => PassOutcome::NothingToDo,
        Ok(ReconcileOutcome::Reconciled(report)) if report.is_complete() => {
            PassOutcome::Reconciled
        }
        Ok(ReconcileOutcome::Reconciled(_)) => PassOutcome::Partial,
        Err(_) => PassOutcome::Error,
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
