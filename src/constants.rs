// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the certer controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Ingress Constants
// ============================================================================

/// Annotation that opts an Ingress into certificate management.
///
/// Any non-empty value enables the controller for the Ingress, provided the
/// Ingress already declares at least one TLS entry.
pub const GEN_CERTS_ANNOTATION: &str = "kubernetes.io/tls-vault";

/// Suffix appended to a hostname to derive the name of its TLS secret
pub const SECRET_NAME_SUFFIX: &str = ".tls";

/// Field manager / controller name used in logs, labels and HTTP user agents
pub const CONTROLLER_NAME: &str = "certer";

/// Kind label used for metrics and log fields
pub const KIND_INGRESS: &str = "Ingress";

// ============================================================================
// Secret Constants
// ============================================================================

/// Secret data key holding the PEM certificate (leaf first, then chain)
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Secret type for TLS secrets created by the controller
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Label marking secrets created by this controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

// ============================================================================
// Vault PKI Constants
// ============================================================================

/// Default mount path of the Vault PKI secrets engine
pub const DEFAULT_VAULT_MOUNT: &str = "pki";

/// Header carrying the Vault token
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

/// Timeout for a single HTTP request to Vault
pub const VAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Controller Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Default requeue interval after a successful pass (1 hour).
///
/// Expiry is only noticed when a pass runs, so every Ingress is revisited periodically.
pub const DEFAULT_REQUEUE_SECS: u64 = 3600;

/// Default number of hosts processed concurrently within one pass
pub const DEFAULT_MAX_CONCURRENT_HOSTS: usize = 1;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics HTTP server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";
