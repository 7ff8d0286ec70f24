// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the certer controller.
//!
//! All metrics carry the namespace prefix `certer_`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Passes over Ingresses and their outcomes
//! - **Certificate Metrics** - Certificates issued, reissue reasons and skips
//! - **Failure Metrics** - Host-scoped failures by pipeline stage
//! - **Spec Metrics** - Writes of the Ingress TLS list
//!
//! # Example
//!
//! ```rust,no_run
//! use certer::metrics::{record_reconciliation, PassOutcome};
//!
//! record_reconciliation(PassOutcome::Reconciled, std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all certer metrics
const METRICS_NAMESPACE: &str = "certer";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliation passes by outcome
///
/// Labels:
/// - `outcome`: `reconciled`, `partial`, `nothing_to_do` or `error`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of Ingress reconciliation passes by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation passes in seconds
///
/// Labels:
/// - `outcome`: same values as [`RECONCILIATION_TOTAL`]
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of Ingress reconciliation passes in seconds",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Certificate Metrics
// ============================================================================

/// Total number of certificates issued and stored
///
/// Labels:
/// - `issuer_mode`: `csr` or `single-host`
pub static CERTIFICATES_ISSUED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificates_issued_total"),
        "Total number of certificates issued and written to secrets",
    );
    let counter = CounterVec::new(opts, &["issuer_mode"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of reissue decisions by reason
///
/// Labels:
/// - `reason`: `missing`, `malformed`, `expired` or `renewal_window`
pub static CERTIFICATE_REISSUES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificate_reissues_total"),
        "Total number of certificates due for (re)issuance by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of TLS entries whose certificate was still valid
pub static CERTIFICATE_SKIPS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_certificate_skips_total"),
        "Total number of TLS entries left untouched because the certificate is still valid",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Failure Metrics
// ============================================================================

/// Total number of host-scoped failures
///
/// Labels:
/// - `stage`: `issue` or `sync`
pub static HOST_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_host_failures_total"),
        "Total number of TLS entries that failed by pipeline stage",
    );
    let counter = CounterVec::new(opts, &["stage"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Spec Metrics
// ============================================================================

/// Total number of Ingress TLS list writes
///
/// Labels:
/// - `reason`: `augment` or `converge`
pub static SPEC_UPDATES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_spec_updates_total"),
        "Total number of Ingress TLS list updates by reason",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Outcome label of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every TLS entry succeeded
    Reconciled,
    /// At least one TLS entry failed
    Partial,
    /// The Ingress is not eligible
    NothingToDo,
    /// The pass aborted
    Error,
}

impl PassOutcome {
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            PassOutcome::Reconciled => "reconciled",
            PassOutcome::Partial => "partial",
            PassOutcome::NothingToDo => "nothing_to_do",
            PassOutcome::Error => "error",
        }
    }
}

/// Record a finished reconciliation pass
///
/// # Arguments
/// * `outcome` - How the pass ended
/// * `duration` - Duration of the pass
pub fn record_reconciliation(outcome: PassOutcome, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[outcome.as_label()])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[outcome.as_label()])
        .observe(duration.as_secs_f64());
}

/// Record a certificate issued and written to its secret
pub fn record_certificate_issued(issuer_mode: &str) {
    CERTIFICATES_ISSUED_TOTAL
        .with_label_values(&[issuer_mode])
        .inc();
}

/// Record a reissue decision
pub fn record_certificate_reissue(reason: &str) {
    CERTIFICATE_REISSUES_TOTAL
        .with_label_values(&[reason])
        .inc();
}

/// Record a TLS entry whose certificate is still valid
pub fn record_certificate_skipped() {
    CERTIFICATE_SKIPS_TOTAL.inc();
}

/// Record a host-scoped failure
///
/// # Arguments
/// * `stage` - Pipeline stage that failed (`issue` or `sync`)
pub fn record_host_failure(stage: &str) {
    HOST_FAILURES_TOTAL.with_label_values(&[stage]).inc();
}

/// Record a write of the Ingress TLS list
///
/// # Arguments
/// * `reason` - `augment` or `converge`
pub fn record_spec_update(reason: &str) {
    SPEC_UPDATES_TOTAL.with_label_values(&[reason]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
