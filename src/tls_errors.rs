// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for certificate issuance and Ingress reconciliation.
//!
//! Errors fall into two scopes:
//! - **Host-scoped** ([`IssuanceError`], [`SecretSyncError`], wrapped in [`HostError`]) - one
//!   TLS entry failed; the pass records the failure and continues with the other entries.
//! - **Pass-scoped** ([`ReconcileError`]) - the Ingress itself could not be read or written;
//!   the pass aborts and the controller requeues it.
//!
//! [`ClusterError`] is what the cluster collaborator reports. A not-found result is an
//! ordinary outcome for secrets (the secret gets created), never a failure on its own.

use thiserror::Error;

/// Errors reported by the cluster collaborator (Kubernetes API).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The named object does not exist (HTTP 404)
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the object (e.g., `Secret`)
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// Any other API failure (conflict, forbidden, server error, transport error)
    #[error("Kubernetes API error for {kind} {namespace}/{name}: {reason}")]
    Api {
        /// Kind of the object (e.g., `Ingress`)
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Error reported by the API server or client
        reason: String,
    },
}

impl ClusterError {
    /// Returns `true` if the object simply does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Errors that can occur while obtaining a certificate from the certificate authority.
///
/// Always scoped to the TLS entry whose primary host was being issued.
#[derive(Error, Debug, Clone)]
pub enum IssuanceError {
    /// The request contained no hostname at all
    #[error("Certificate issuance requested without any hostname")]
    NoHosts,

    /// The authority answered with a non-success HTTP status
    #[error("Certificate authority at {endpoint} rejected request for '{host}' (HTTP {status_code}): {reason}")]
    Rejected {
        /// Primary host of the request
        host: String,
        /// CA endpoint that answered
        endpoint: String,
        /// HTTP status code returned
        status_code: u16,
        /// Error text returned by the authority
        reason: String,
    },

    /// The authority could not be reached or kept failing with transient errors
    #[error("Certificate authority at {endpoint} unavailable while issuing for '{host}': {reason}")]
    Unavailable {
        /// Primary host of the request
        host: String,
        /// CA endpoint that was contacted
        endpoint: String,
        /// Transport or retry-exhaustion reason
        reason: String,
    },

    /// The authority answered successfully but the payload was unusable
    #[error("Invalid response from certificate authority for '{host}': {reason}")]
    InvalidResponse {
        /// Primary host of the request
        host: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Local key or CSR generation failed
    #[error("Failed to generate key material for '{host}': {reason}")]
    KeyGeneration {
        /// Primary host of the request
        host: String,
        /// Underlying generator error
        reason: String,
    },
}

/// Errors that can occur while writing key material into the backing secret.
#[derive(Error, Debug, Clone)]
pub enum SecretSyncError {
    /// Creating a new secret failed
    #[error("Failed to create secret {namespace}/{name}: {source}")]
    CreateFailed {
        /// Namespace of the secret
        namespace: String,
        /// Name of the secret
        name: String,
        /// Cluster error returned by the create call
        #[source]
        source: ClusterError,
    },

    /// Updating an existing secret failed
    #[error("Failed to update secret {namespace}/{name}: {source}")]
    UpdateFailed {
        /// Namespace of the secret
        namespace: String,
        /// Name of the secret
        name: String,
        /// Cluster error returned by the update call
        #[source]
        source: ClusterError,
    },
}

/// A host-scoped failure inside the per-host loop.
#[derive(Error, Debug, Clone)]
pub enum HostError {
    /// The certificate authority did not deliver a key pair
    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    /// The key pair could not be stored
    #[error(transparent)]
    SecretSync(#[from] SecretSyncError),
}

impl HostError {
    /// Stage of the per-host pipeline that failed (`issue` or `sync`).
    ///
    /// Used as a metrics label.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            HostError::Issuance(_) => "issue",
            HostError::SecretSync(_) => "sync",
        }
    }
}

/// Pass-scoped errors. Any of these aborts the reconciliation pass.
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// The Ingress is missing metadata required to address it
    #[error("Ingress is missing metadata.{field}")]
    MissingMetadata {
        /// Name of the missing metadata field
        field: &'static str,
    },

    /// Augmented TLS entries could not be saved
    #[error("Failed to persist augmented TLS entries of ingress {namespace}/{name}: {source}")]
    SpecPersist {
        /// Namespace of the Ingress
        namespace: String,
        /// Name of the Ingress
        name: String,
        /// Cluster error returned by the update call
        #[source]
        source: ClusterError,
    },

    /// The latest Ingress could not be read, or its TLS list could not be narrowed to the
    /// successful entries
    #[error("Failed to converge TLS entries of ingress {namespace}/{name}: {source}")]
    ConvergencePersist {
        /// Namespace of the Ingress
        namespace: String,
        /// Name of the Ingress
        name: String,
        /// Cluster error returned by the get or update call
        #[source]
        source: ClusterError,
    },
}

#[cfg(test)]
#[path = "tls_errors_tests.rs"]
mod tls_errors_tests;
