// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # certer - Ingress TLS certificates from Vault PKI
//!
//! certer is a Kubernetes controller that keeps the TLS certificates behind Ingress
//! resources complete and valid. For every routable host of a managed Ingress it makes sure
//! a TLS entry exists, that the entry's secret holds a certificate which has not expired,
//! and it issues a new certificate from Vault when it has.
//!
//! ## Overview
//!
//! An Ingress is managed when it carries the `kubernetes.io/tls-vault` annotation and at
//! least one TLS entry, or when the controller runs with `--force-tls`. Each pass:
//!
//! 1. adds a single-host TLS entry (`<host>.tls`) for every rule host without one
//! 2. reissues missing, unparseable or expired certificates and writes them to secrets
//! 3. narrows the TLS list to the entries that ended up with a valid certificate
//!
//! A failure for one host never stops the others.
//!
//! ## Modules
//!
//! - [`coverage`] - Which rule hosts lack a TLS entry, and adding entries for them
//! - [`expiry`] - Whether a stored certificate must be reissued
//! - [`issuer`] - Certificate authority abstraction and the Vault PKI issuers
//! - [`cluster`] - Kubernetes reads and writes behind a trait
//! - [`reconcilers`] - The per-Ingress pass and secret synchronization
//! - [`config`] - Command-line and environment configuration
//! - [`context`] - Shared controller state
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use certer::coverage::{missing_hosts, secret_name_for_host};
//! use k8s_openapi::api::networking::v1::{IngressRule, IngressTLS};
//!
//! let rules = vec![
//!     IngressRule { host: Some("a.com".to_string()), ..Default::default() },
//!     IngressRule { host: Some("b.com".to_string()), ..Default::default() },
//! ];
//! let tls = vec![IngressTLS {
//!     hosts: Some(vec!["a.com".to_string()]),
//!     secret_name: Some(secret_name_for_host("a.com")),
//! }];
//!
//! assert_eq!(missing_hosts(&rules, &tls), vec!["b.com".to_string()]);
//! ```

pub mod cluster;
pub mod config;
pub mod constants;
pub mod context;
pub mod coverage;
pub mod expiry;
pub mod issuer;
pub mod metrics;
pub mod reconcilers;
pub mod tls_errors;

#[cfg(test)]
mod test_support;
