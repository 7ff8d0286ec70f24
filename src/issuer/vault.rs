// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP client for the Vault PKI secrets engine.
//!
//! Both issuer shapes post to `/v1/<mount>/<operation>/<role>`:
//! - `sign` takes a CSR and returns the signed certificate
//! - `issue` generates the key on the Vault side and returns certificate and key
//!
//! Transient failures (429, 5xx, transport errors) are retried with the HTTP backoff
//! policy; anything else is reported at once as a host-scoped [`IssuanceError`].

use crate::constants::{CONTROLLER_NAME, VAULT_REQUEST_TIMEOUT_SECS, VAULT_TOKEN_HEADER};
use crate::reconcilers::retry::{http_backoff, is_retryable_http_status, HTTP_MAX_ELAPSED_TIME_SECS};
use crate::tls_errors::IssuanceError;
use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Connection settings for Vault.
#[derive(Clone)]
pub struct VaultConfig {
    /// Base address, e.g. `https://vault.vault.svc:8200`
    pub addr: String,
    /// Token sent in `X-Vault-Token`
    pub token: String,
    /// Mount path of the PKI secrets engine
    pub mount: String,
    /// PKI role used for issuance
    pub role: String,
    /// Requested certificate TTL (Vault duration string); the role default if `None`
    pub ttl: Option<String>,
    /// Total time budget for retrying transient failures of one request
    pub max_retry_elapsed: Duration,
}

impl VaultConfig {
    /// Settings with the default mount, no TTL override and the default retry budget.
    #[must_use]
    pub fn new(addr: impl Into<String>, token: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: token.into(),
            mount: crate::constants::DEFAULT_VAULT_MOUNT.to_string(),
            role: role.into(),
            ttl: None,
            max_retry_elapsed: Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS),
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("addr", &self.addr)
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .field("role", &self.role)
            .field("ttl", &self.ttl)
            .field("max_retry_elapsed", &self.max_retry_elapsed)
            .finish()
    }
}

/// PKI endpoint used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiOperation {
    /// `POST /v1/<mount>/sign/<role>` with a CSR
    Sign,
    /// `POST /v1/<mount>/issue/<role>`, key generated by Vault
    Issue,
}

impl PkiOperation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PkiOperation::Sign => "sign",
            PkiOperation::Issue => "issue",
        }
    }
}

/// Certificate material returned under `data` by the PKI endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultCertificate {
    /// Leaf certificate (PEM)
    pub certificate: String,
    /// Certificate of the issuing CA (PEM)
    #[serde(default)]
    pub issuing_ca: Option<String>,
    /// Full issuing chain (PEM entries)
    #[serde(default)]
    pub ca_chain: Option<Vec<String>>,
    /// Private key, only present for the `issue` operation
    #[serde(default)]
    pub private_key: Option<String>,
}

impl VaultCertificate {
    /// The leaf certificate followed by the issuing chain, one PEM block per line group.
    ///
    /// `ca_chain` is preferred; `issuing_ca` is used when Vault returns no chain.
    #[must_use]
    pub fn chain_pem(&self) -> String {
        let leaf = self.certificate.trim();
        let chain: Vec<&str> = match (&self.ca_chain, &self.issuing_ca) {
            (Some(chain), _) if !chain.is_empty() => chain.iter().map(|c| c.trim()).collect(),
            (_, Some(ca)) => vec![ca.trim()],
            _ => Vec::new(),
        };

        let mut pem = format!("{leaf}\n");
        for cert in chain.into_iter().filter(|c| !c.is_empty() && *c != leaf) {
            pem.push_str(cert);
            pem.push('\n');
        }
        pem
    }
}

#[derive(Deserialize)]
struct VaultResponse {
    data: Option<VaultCertificate>,
}

#[derive(Deserialize)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

/// Outcome of a single request attempt.
enum Attempt {
    Retry(IssuanceError),
    Fail(IssuanceError),
}

/// Vault PKI client shared by both issuer shapes.
#[derive(Clone)]
pub struct VaultClient {
    http: HttpClient,
    addr: String,
    token: String,
    mount: String,
    role: String,
    ttl: Option<String>,
    max_retry_elapsed: Duration,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("addr", &self.addr)
            .field("mount", &self.mount)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid URL, the role is empty, or the HTTP
    /// client cannot be constructed.
    pub fn new(config: VaultConfig) -> Result<Self> {
        url::Url::parse(&config.addr)
            .with_context(|| format!("Invalid Vault address '{}'", config.addr))?;
        if config.role.trim().is_empty() {
            anyhow::bail!("Vault PKI role must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(VAULT_REQUEST_TIMEOUT_SECS))
            .user_agent(format!("{CONTROLLER_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Vault HTTP client")?;

        Ok(Self {
            http,
            addr: config.addr.trim_end_matches('/').to_string(),
            token: config.token,
            mount: config.mount.trim_matches('/').to_string(),
            role: config.role,
            ttl: config.ttl.filter(|ttl| !ttl.trim().is_empty()),
            max_retry_elapsed: config.max_retry_elapsed,
        })
    }

    /// Base address of the Vault server.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Requested TTL, if any.
    #[must_use]
    pub fn ttl(&self) -> Option<&str> {
        self.ttl.as_deref()
    }

    /// URL of a PKI operation for the configured mount and role.
    #[must_use]
    pub fn pki_url(&self, operation: PkiOperation) -> String {
        format!(
            "{}/v1/{}/{}/{}",
            self.addr,
            self.mount,
            operation.as_str(),
            self.role
        )
    }

    /// Post `body` to a PKI operation and return the certificate data.
    ///
    /// # Errors
    ///
    /// Returns [`IssuanceError::Rejected`] for non-retryable HTTP statuses,
    /// [`IssuanceError::InvalidResponse`] for unusable payloads, and the last transient error
    /// once the retry budget is spent.
    pub async fn request_certificate(
        &self,
        operation: PkiOperation,
        host: &str,
        body: &serde_json::Value,
    ) -> Result<VaultCertificate, IssuanceError> {
        let url = self.pki_url(operation);
        let mut backoff = http_backoff().with_max_elapsed_time(self.max_retry_elapsed);
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once(&url, host, body).await {
                Ok(certificate) => {
                    if attempt > 1 {
                        debug!(
                            url = %url,
                            host = host,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            "Vault request succeeded after retries"
                        );
                    }
                    return Ok(certificate);
                }
                Err(Attempt::Fail(e)) => {
                    error!(url = %url, host = host, error = %e, "Non-retryable Vault error");
                    return Err(e);
                }
                Err(Attempt::Retry(e)) => {
                    if let Some(duration) = backoff.next_backoff() {
                        warn!(
                            url = %url,
                            host = host,
                            attempt = attempt,
                            retry_after = ?duration,
                            error = %e,
                            "Retryable Vault error, will retry"
                        );
                        tokio::time::sleep(duration).await;
                    } else {
                        error!(
                            url = %url,
                            host = host,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            error = %e,
                            "Vault retry budget exhausted, giving up"
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        host: &str,
        body: &serde_json::Value,
    ) -> Result<VaultCertificate, Attempt> {
        let unavailable = |reason: String| {
            Attempt::Retry(IssuanceError::Unavailable {
                host: host.to_string(),
                endpoint: self.addr.clone(),
                reason,
            })
        };
        let invalid = |reason: String| {
            Attempt::Fail(IssuanceError::InvalidResponse {
                host: host.to_string(),
                reason,
            })
        };

        let response = self
            .http
            .post(url)
            .header(VAULT_TOKEN_HEADER, &self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| unavailable(format!("Failed to send request: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| unavailable(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            let rejected = IssuanceError::Rejected {
                host: host.to_string(),
                endpoint: self.addr.clone(),
                status_code: status.as_u16(),
                reason: vault_error_message(&text),
            };
            return Err(if is_retryable_http_status(status) {
                Attempt::Retry(rejected)
            } else {
                Attempt::Fail(rejected)
            });
        }

        let parsed: VaultResponse = serde_json::from_str(&text)
            .map_err(|e| invalid(format!("Malformed JSON response: {e}")))?;
        let data = parsed
            .data
            .ok_or_else(|| invalid("Response has no data".to_string()))?;
        if data.certificate.trim().is_empty() {
            return Err(invalid("Response has no certificate".to_string()));
        }

        Ok(data)
    }
}

/// Human-readable error from a Vault error body (`{"errors": [...]}`), or the raw text.
fn vault_error_message(body: &str) -> String {
    match serde_json::from_str::<VaultErrors>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod vault_tests;
