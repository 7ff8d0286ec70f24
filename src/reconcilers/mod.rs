// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for Ingress TLS certificates.
//!
//! The controller watches Ingress resources and, for every managed Ingress, makes sure each
//! routable host has a TLS entry backed by a valid certificate.
//!
//! # Reconciliation Architecture
//!
//! certer follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Monitor Ingress changes via the Kubernetes API
//! 2. **Reconcile** - Compare declared hosts with TLS entries and stored certificates
//! 3. **Update** - Issue certificates, write secrets and converge the TLS list
//!
//! # Modules
//!
//! - [`ingress`] - The per-Ingress pass ([`reconcile_ingress`])
//! - [`secrets`] - Writing key material into TLS secrets ([`sync_secret`])
//! - [`retry`] - Exponential backoff for Kubernetes and certificate authority calls
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use certer::cluster::KubeClusterApi;
//! use certer::issuer::{build_issuer, IssuerMode, VaultClient, VaultConfig};
//! use certer::reconcilers::{reconcile_ingress, ReconcileConfig};
//! use k8s_openapi::api::networking::v1::Ingress;
//!
//! async fn reconcile(client: kube::Client, ingress: Ingress) -> anyhow::Result<()> {
//!     let cluster = KubeClusterApi::new(client);
//!     let vault = VaultClient::new(VaultConfig::new("https://vault:8200", "token", "web"))?;
//!     let issuer = build_issuer(IssuerMode::Csr, vault);
//!
//!     reconcile_ingress(&cluster, issuer.as_ref(), &ReconcileConfig::default(), &ingress).await?;
//!     Ok(())
//! }
//! ```

pub mod ingress;
pub mod retry;
pub mod secrets;

pub use ingress::{
    is_eligible, reconcile_ingress, HostFailure, PassReport, ReconcileConfig, ReconcileOutcome,
};
pub use secrets::sync_secret;
