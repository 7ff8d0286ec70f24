// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress TLS reconciliation.
//!
//! One pass over one Ingress moves through these states:
//!
//! 1. **Eligibility** - the Ingress opts in (annotation + TLS entries) or the force flag is
//!    set; otherwise the pass returns [`ReconcileOutcome::NothingToDo`] without touching
//!    anything.
//! 2. **Augmenting** - every routable rule host without a TLS entry gets a single-host entry.
//!    If the TLS list changed it is persisted before any certificate work starts.
//! 3. **Per-host loop** - for each TLS entry the stored certificate is checked; expired,
//!    missing or unparseable certificates are reissued and written to the entry's secret.
//!    A failing entry is recorded and the loop moves on.
//! 4. **Converging** - the latest Ingress is fetched and, if the number of successful entries
//!    differs from its TLS list, the list is narrowed to the successful entries.
//!
//! Nothing is cached between passes, so a failed pass can simply be run again.

use crate::cluster::ClusterApi;
use crate::constants::{DEFAULT_MAX_CONCURRENT_HOSTS, GEN_CERTS_ANNOTATION, TLS_CERT_KEY};
use crate::coverage::{augment_spec, secret_name_for_host};
use crate::expiry::{ExpiryDecision, ExpiryGate};
use crate::issuer::CertificateIssuer;
use crate::metrics;
use crate::reconcilers::secrets::sync_secret;
use crate::tls_errors::{HostError, ReconcileError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use k8s_openapi::api::networking::v1::{Ingress, IngressTLS};
use tracing::{debug, error, info, warn};

/// Per-pass reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Manage every Ingress, annotated or not, and cover every rule host
    pub force_all_hosts: bool,
    /// Require the opt-in annotation; when `false` a non-empty TLS list is enough
    pub require_annotation: bool,
    /// Store all secrets in this namespace instead of the Ingress namespace
    pub secret_namespace: Option<String>,
    /// Decides when a stored certificate must be reissued
    pub expiry: ExpiryGate,
    /// Number of TLS entries processed concurrently
    pub max_concurrent_hosts: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            force_all_hosts: false,
            require_annotation: true,
            secret_namespace: None,
            expiry: ExpiryGate::default(),
            max_concurrent_hosts: DEFAULT_MAX_CONCURRENT_HOSTS,
        }
    }
}

impl ReconcileConfig {
    /// Namespace holding the secrets of an Ingress in `ingress_namespace`.
    #[must_use]
    pub fn secret_namespace_for<'a>(&'a self, ingress_namespace: &'a str) -> &'a str {
        self.secret_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(ingress_namespace)
    }
}

/// A TLS entry that failed during the per-host loop.
#[derive(Debug, Clone)]
pub struct HostFailure {
    /// Primary host of the entry
    pub host: String,
    /// Secret backing the entry
    pub secret_name: String,
    /// What went wrong
    pub error: HostError,
}

/// Result of a completed pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// The Ingress as it stands after the pass
    pub ingress: Ingress,
    /// TLS entries whose certificate is valid, in original order
    pub succeeded: Vec<IngressTLS>,
    /// Entries that failed, in original order
    pub failures: Vec<HostFailure>,
    /// Number of certificates issued and stored
    pub issued: usize,
    /// Number of entries left untouched because their certificate is still valid
    pub skipped: usize,
}

impl PassReport {
    /// `true` if no entry failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of [`reconcile_ingress`].
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The Ingress is not managed; nothing was read or written
    NothingToDo,
    /// The pass ran to completion (possibly with host failures)
    Reconciled(Box<PassReport>),
}

/// Whether the controller manages `ingress` under `config`.
#[must_use]
pub fn is_eligible(ingress: &Ingress, config: &ReconcileConfig) -> bool {
    if config.force_all_hosts {
        return true;
    }

    let has_tls = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .is_some_and(|tls| !tls.is_empty());
    if !config.require_annotation {
        return has_tls;
    }

    let annotated = ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(GEN_CERTS_ANNOTATION))
        .is_some_and(|value| !value.trim().is_empty());

    annotated && has_tls
}

/// Run one reconciliation pass over `ingress`.
///
/// # Errors
///
/// Returns [`ReconcileError::SpecPersist`] if augmented TLS entries cannot be saved and
/// [`ReconcileError::ConvergencePersist`] if the latest Ingress cannot be read or narrowed.
/// Failures of individual TLS entries are not errors; they are listed in the
/// [`PassReport`].
pub async fn reconcile_ingress(
    cluster: &dyn ClusterApi,
    issuer: &dyn CertificateIssuer,
    config: &ReconcileConfig,
    ingress: &Ingress,
) -> Result<ReconcileOutcome, ReconcileError> {
    let namespace = ingress
        .metadata
        .namespace
        .as_deref()
        .ok_or(ReconcileError::MissingMetadata { field: "namespace" })?;
    let name = ingress
        .metadata
        .name
        .as_deref()
        .ok_or(ReconcileError::MissingMetadata { field: "name" })?;

    if !is_eligible(ingress, config) {
        debug!(
            namespace = namespace,
            ingress = name,
            "Ingress is not eligible for certificate management"
        );
        return Ok(ReconcileOutcome::NothingToDo);
    }

    info!(namespace = namespace, ingress = name, "Reconciling ingress TLS");

    let baseline = augment(cluster, namespace, name, ingress).await?;
    let entries = baseline
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.clone())
        .unwrap_or_default();

    let secret_namespace = config.secret_namespace_for(namespace);
    let now = Utc::now();

    let pending: Vec<_> = entries
        .iter()
        .map(|entry| process_entry(cluster, issuer, config, secret_namespace, entry, now))
        .collect();
    let results: Vec<EntryResult> = stream::iter(pending)
        .buffered(config.max_concurrent_hosts.max(1))
        .collect()
        .await;

    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    let mut issued = 0;
    let mut skipped = 0;

    for (entry, result) in entries.iter().zip(results) {
        match result {
            EntryResult::Skipped => {
                skipped += 1;
                succeeded.push(entry.clone());
            }
            EntryResult::Issued => {
                issued += 1;
                succeeded.push(entry.clone());
            }
            EntryResult::Failed(failure) => failures.push(failure),
            EntryResult::NoHosts => {}
        }
    }

    let ingress = converge(cluster, namespace, name, &succeeded).await?;

    info!(
        namespace = namespace,
        ingress = name,
        succeeded = succeeded.len(),
        failed = failures.len(),
        issued = issued,
        skipped = skipped,
        "Finished ingress TLS reconciliation"
    );

    Ok(ReconcileOutcome::Reconciled(Box::new(PassReport {
        ingress,
        succeeded,
        failures,
        issued,
        skipped,
    })))
}

/// Add entries for uncovered hosts and persist them. Returns the baseline for the loop.
async fn augment(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    ingress: &Ingress,
) -> Result<Ingress, ReconcileError> {
    let mut augmented = ingress.clone();
    let spec = augmented.spec.get_or_insert_with(Default::default);
    if !augment_spec(spec) {
        return Ok(ingress.clone());
    }

    info!(
        namespace = namespace,
        ingress = name,
        tls_entries = spec.tls.as_ref().map_or(0, Vec::len),
        "Adding TLS entries for uncovered hosts"
    );

    let persisted = cluster
        .replace_ingress(namespace, &augmented)
        .await
        .map_err(|source| ReconcileError::SpecPersist {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;
    metrics::record_spec_update("augment");

    Ok(persisted)
}

/// Narrow the TLS list of the latest Ingress to `succeeded` if the counts differ.
async fn converge(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    succeeded: &[IngressTLS],
) -> Result<Ingress, ReconcileError> {
    let convergence_error = |source| ReconcileError::ConvergencePersist {
        namespace: namespace.to_string(),
        name: name.to_string(),
        source,
    };

    let mut latest = cluster
        .get_ingress(namespace, name)
        .await
        .map_err(convergence_error)?;

    let recorded = latest
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .map_or(0, Vec::len);
    if recorded == succeeded.len() {
        return Ok(latest);
    }

    warn!(
        namespace = namespace,
        ingress = name,
        recorded = recorded,
        succeeded = succeeded.len(),
        "Narrowing TLS entries to hosts with a valid certificate"
    );

    latest.spec.get_or_insert_with(Default::default).tls = Some(succeeded.to_vec());
    let persisted = cluster
        .replace_ingress(namespace, &latest)
        .await
        .map_err(convergence_error)?;
    metrics::record_spec_update("converge");

    Ok(persisted)
}

enum EntryResult {
    Skipped,
    Issued,
    Failed(HostFailure),
    NoHosts,
}

async fn process_entry(
    cluster: &dyn ClusterApi,
    issuer: &dyn CertificateIssuer,
    config: &ReconcileConfig,
    secret_namespace: &str,
    entry: &IngressTLS,
    now: DateTime<Utc>,
) -> EntryResult {
    let hosts: Vec<String> = entry
        .hosts
        .iter()
        .flatten()
        .map(|host| host.trim())
        .filter(|host| !host.is_empty())
        .map(ToString::to_string)
        .collect();
    let Some(primary) = hosts.first() else {
        debug!(secret = ?entry.secret_name, "Skipping TLS entry without hosts");
        return EntryResult::NoHosts;
    };

    let secret_name = entry
        .secret_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| secret_name_for_host(primary), ToString::to_string);

    let stored = match cluster.get_secret(secret_namespace, &secret_name).await {
        Ok(secret) => secret
            .data
            .and_then(|mut data| data.remove(TLS_CERT_KEY))
            .map(|bytes| bytes.0),
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            warn!(
                host = %primary,
                namespace = secret_namespace,
                secret = %secret_name,
                error = %e,
                "Failed to read secret, treating certificate as missing"
            );
            None
        }
    };

    let reason = match config.expiry.evaluate(stored.as_deref(), now) {
        ExpiryDecision::Skip { not_after } => {
            debug!(
                host = %primary,
                secret = %secret_name,
                not_after = %not_after,
                "Certificate still valid"
            );
            metrics::record_certificate_skipped();
            return EntryResult::Skipped;
        }
        ExpiryDecision::Reissue(reason) => reason,
    };

    info!(
        host = %primary,
        namespace = secret_namespace,
        secret = %secret_name,
        reason = %reason,
        "Issuing certificate"
    );
    metrics::record_certificate_reissue(reason.as_label());

    let result = async {
        let pair = issuer.issue(primary, &hosts).await?;
        sync_secret(cluster, secret_namespace, &secret_name, &pair).await?;
        Ok::<(), HostError>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(
                host = %primary,
                namespace = secret_namespace,
                secret = %secret_name,
                "Stored new certificate"
            );
            metrics::record_certificate_issued(&issuer.mode().to_string());
            EntryResult::Issued
        }
        Err(e) => {
            error!(
                host = %primary,
                namespace = secret_namespace,
                secret = %secret_name,
                stage = e.stage(),
                error = %e,
                "Failed to provision certificate"
            );
            metrics::record_host_failure(e.stage());
            EntryResult::Failed(HostFailure {
                host: primary.clone(),
                secret_name,
                error: e,
            })
        }
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
