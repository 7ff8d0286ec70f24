// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single-host issuer: Vault generates key and certificate for one hostname.

use super::vault::{PkiOperation, VaultClient};
use super::{CertificateIssuer, IssuerMode, KeyPair};
use crate::tls_errors::IssuanceError;
use serde_json::json;
use tracing::debug;

/// Issues certificates with the Vault `issue` endpoint for the primary host only.
#[derive(Debug, Clone)]
pub struct SingleHostIssuer {
    vault: VaultClient,
}

impl SingleHostIssuer {
    #[must_use]
    pub fn new(vault: VaultClient) -> Self {
        Self { vault }
    }
}

#[async_trait::async_trait]
impl CertificateIssuer for SingleHostIssuer {
    async fn issue(
        &self,
        primary_host: &str,
        all_hosts: &[String],
    ) -> Result<KeyPair, IssuanceError> {
        if primary_host.trim().is_empty() {
            return Err(IssuanceError::NoHosts);
        }
        if all_hosts.len() > 1 {
            debug!(
                host = primary_host,
                ignored = all_hosts.len() - 1,
                "Single-host issuer certifies only the primary host"
            );
        }

        let mut body = json!({ "common_name": primary_host });
        if let Some(ttl) = self.vault.ttl() {
            body["ttl"] = json!(ttl);
        }

        let issued = self
            .vault
            .request_certificate(PkiOperation::Issue, primary_host, &body)
            .await?;

        let private = issued
            .private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| IssuanceError::InvalidResponse {
                host: primary_host.to_string(),
                reason: "Response has no private key".to_string(),
            })?;

        let public = issued.chain_pem();
        debug!(host = primary_host, certificate = %public, "Received issued certificate");

        Ok(KeyPair {
            public: public.into_bytes(),
            private: format!("{private}\n").into_bytes(),
        })
    }

    fn mode(&self) -> IssuerMode {
        IssuerMode::SingleHost
    }
}

#[cfg(test)]
#[path = "single_host_tests.rs"]
mod single_host_tests;
