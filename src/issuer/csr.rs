// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CSR-based issuer: the key never leaves the controller until it is written to the secret.

use super::vault::{PkiOperation, VaultClient};
use super::{certificate_hosts, CertificateIssuer, IssuerMode, KeyPair};
use crate::tls_errors::IssuanceError;
use rcgen::{CertificateParams, DistinguishedName, DnType};
use serde_json::json;
use tracing::debug;

/// Issues certificates by having Vault sign a locally generated CSR.
///
/// The CSR subject CN is the primary host and its SANs are all hosts of the TLS entry.
#[derive(Debug, Clone)]
pub struct CsrIssuer {
    vault: VaultClient,
}

impl CsrIssuer {
    #[must_use]
    pub fn new(vault: VaultClient) -> Self {
        Self { vault }
    }
}

#[async_trait::async_trait]
impl CertificateIssuer for CsrIssuer {
    async fn issue(
        &self,
        primary_host: &str,
        all_hosts: &[String],
    ) -> Result<KeyPair, IssuanceError> {
        if primary_host.trim().is_empty() {
            return Err(IssuanceError::NoHosts);
        }

        let hosts = certificate_hosts(primary_host, all_hosts);
        let (csr_pem, key_pem) = build_csr(&hosts)?;

        debug!(host = primary_host, sans = ?hosts, "Requesting signature for certificate request");

        let mut body = json!({
            "csr": csr_pem,
            "common_name": primary_host,
            "alt_names": hosts[1..].join(","),
        });
        if let Some(ttl) = self.vault.ttl() {
            body["ttl"] = json!(ttl);
        }

        let signed = self
            .vault
            .request_certificate(PkiOperation::Sign, primary_host, &body)
            .await?;

        let public = signed.chain_pem();
        debug!(host = primary_host, certificate = %public, "Received signed certificate");

        Ok(KeyPair {
            public: public.into_bytes(),
            private: key_pem.into_bytes(),
        })
    }

    fn mode(&self) -> IssuerMode {
        IssuerMode::Csr
    }
}

/// Generate a private key and a PEM CSR for `hosts` (the first host is the subject CN).
///
/// Returns `(csr_pem, private_key_pem)`.
///
/// # Errors
///
/// Returns [`IssuanceError::NoHosts`] for an empty host list and
/// [`IssuanceError::KeyGeneration`] if a hostname is not a valid DNS name or key/CSR
/// generation fails.
pub fn build_csr(hosts: &[String]) -> Result<(String, String), IssuanceError> {
    let primary = hosts.first().ok_or(IssuanceError::NoHosts)?;
    let key_generation = |reason: String| IssuanceError::KeyGeneration {
        host: primary.clone(),
        reason,
    };

    let mut params = CertificateParams::new(hosts.to_vec())
        .map_err(|e| key_generation(format!("Invalid subject alternative name: {e}")))?;
    let mut subject = DistinguishedName::new();
    subject.push(DnType::CommonName, primary.as_str());
    params.distinguished_name = subject;

    let key = rcgen::KeyPair::generate()
        .map_err(|e| key_generation(format!("Private key generation failed: {e}")))?;
    let csr = params
        .serialize_request(&key)
        .map_err(|e| key_generation(format!("CSR generation failed: {e}")))?;
    let csr_pem = csr
        .pem()
        .map_err(|e| key_generation(format!("CSR encoding failed: {e}")))?;

    Ok((csr_pem, key.serialize_pem()))
}

#[cfg(test)]
#[path = "csr_tests.rs"]
mod csr_tests;
