// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate authority abstraction.
//!
//! The reconciler asks a [`CertificateIssuer`] for a fresh certificate and private key for a
//! TLS entry. Two authority shapes exist, both backed by the Vault PKI secrets engine:
//!
//! - [`CsrIssuer`] - the private key is generated locally and only a certificate signing
//!   request leaves the controller. The certificate covers every host of the TLS entry.
//! - [`SingleHostIssuer`] - the authority generates key and certificate for the primary
//!   host of the entry.
//!
//! The shape is chosen once, at startup, with [`IssuerMode`] and [`build_issuer`].
//! Failures are always scoped to the host being issued.

pub mod csr;
pub mod single_host;
pub mod vault;

pub use csr::CsrIssuer;
pub use single_host::SingleHostIssuer;
pub use vault::{VaultClient, VaultConfig};

use crate::tls_errors::IssuanceError;
use std::fmt;
use std::sync::Arc;

/// A freshly issued certificate and its private key, both PEM-encoded.
///
/// Consumed immediately into a secret; never persisted anywhere else.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Certificate followed by the issuing chain
    pub public: Vec<u8>,
    /// Private key
    pub private: Vec<u8>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &String::from_utf8_lossy(&self.public))
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Which certificate authority shape to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IssuerMode {
    /// Sign a locally generated CSR covering every host of the entry
    Csr,
    /// Let the authority generate key and certificate for the primary host
    SingleHost,
}

impl fmt::Display for IssuerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerMode::Csr => f.write_str("csr"),
            IssuerMode::SingleHost => f.write_str("single-host"),
        }
    }
}

/// Capability to obtain a certificate for a set of hostnames.
#[async_trait::async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Issue a certificate whose subject is `primary_host`.
    ///
    /// `all_hosts` is the full host list of the TLS entry (normally starting with
    /// `primary_host`); implementations that can only certify one name ignore the rest.
    ///
    /// # Errors
    ///
    /// Returns an [`IssuanceError`] scoped to `primary_host` if the authority rejects the
    /// request, cannot be reached, or answers with an unusable payload.
    async fn issue(&self, primary_host: &str, all_hosts: &[String])
        -> Result<KeyPair, IssuanceError>;

    /// The authority shape implemented.
    fn mode(&self) -> IssuerMode;
}

/// Build the issuer for `mode` on top of a Vault client.
#[must_use]
pub fn build_issuer(mode: IssuerMode, vault: VaultClient) -> Arc<dyn CertificateIssuer> {
    match mode {
        IssuerMode::Csr => Arc::new(CsrIssuer::new(vault)),
        IssuerMode::SingleHost => Arc::new(SingleHostIssuer::new(vault)),
    }
}

/// Hostnames for the certificate: `primary_host` first, then the remaining hosts in order,
/// without blanks or duplicates.
#[must_use]
pub fn certificate_hosts(primary_host: &str, all_hosts: &[String]) -> Vec<String> {
    let mut hosts = vec![primary_host.to_string()];
    for host in all_hosts {
        let host = host.trim();
        if !host.is_empty() && !hosts.iter().any(|h| h == host) {
            hosts.push(host.to_string());
        }
    }
    hosts
}
