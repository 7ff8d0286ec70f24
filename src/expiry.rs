// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate expiry gate.
//!
//! Decides, for the certificate currently stored in a TLS secret, whether the host can be
//! skipped this pass or must be reissued. The gate never fails: a missing or unreadable
//! certificate is a reason to reissue, which lets a pass heal a corrupt secret.
//!
//! Stored certificates are normally PEM (leaf first, then chain); raw DER is accepted too.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::debug;

/// PEM tag of an X.509 certificate block
const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Why a certificate has to be reissued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReissueReason {
    /// No certificate is stored
    Missing,
    /// The stored bytes are not a parseable certificate
    Malformed,
    /// `now` is at or past `notAfter`
    Expired,
    /// `notAfter` falls inside the configured renewal window
    RenewalWindow,
}

impl fmt::Display for ReissueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ReissueReason::Missing => "missing",
            ReissueReason::Malformed => "malformed",
            ReissueReason::Expired => "expired",
            ReissueReason::RenewalWindow => "renewal window",
        };
        f.write_str(reason)
    }
}

impl ReissueReason {
    /// Metrics label of the reason.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            ReissueReason::Missing => "missing",
            ReissueReason::Malformed => "malformed",
            ReissueReason::Expired => "expired",
            ReissueReason::RenewalWindow => "renewal_window",
        }
    }
}

/// Outcome of the expiry gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    /// The certificate is still valid; nothing to do this pass
    Skip {
        /// Expiry of the stored certificate
        not_after: DateTime<Utc>,
    },
    /// A new certificate must be requested
    Reissue(ReissueReason),
}

impl ExpiryDecision {
    #[must_use]
    pub fn needs_reissue(&self) -> bool {
        matches!(self, ExpiryDecision::Reissue(_))
    }
}

/// Expiry gate with an optional renewal window.
///
/// With the default (zero) window a certificate is reissued exactly when `now >= notAfter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryGate {
    renew_before: Duration,
}

impl Default for ExpiryGate {
    fn default() -> Self {
        Self {
            renew_before: Duration::zero(),
        }
    }
}

impl ExpiryGate {
    /// Gate that reissues certificates `renew_before` ahead of their expiry.
    ///
    /// Negative windows are clamped to zero.
    #[must_use]
    pub fn new(renew_before: Duration) -> Self {
        Self {
            renew_before: renew_before.max(Duration::zero()),
        }
    }

    #[must_use]
    pub fn renew_before(&self) -> Duration {
        self.renew_before
    }

    /// Evaluate a stored certificate against `now`.
    #[must_use]
    pub fn evaluate(&self, stored: Option<&[u8]>, now: DateTime<Utc>) -> ExpiryDecision {
        let Some(bytes) = stored.filter(|bytes| !bytes.is_empty()) else {
            return ExpiryDecision::Reissue(ReissueReason::Missing);
        };

        let Some(not_after) = certificate_not_after(bytes) else {
            debug!("Stored certificate could not be parsed");
            return ExpiryDecision::Reissue(ReissueReason::Malformed);
        };

        if now >= not_after {
            ExpiryDecision::Reissue(ReissueReason::Expired)
        } else if now + self.renew_before >= not_after {
            ExpiryDecision::Reissue(ReissueReason::RenewalWindow)
        } else {
            ExpiryDecision::Skip { not_after }
        }
    }
}

/// `notAfter` of the first certificate in `bytes`, or `None` if it cannot be parsed.
#[must_use]
pub fn certificate_not_after(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let der = certificate_der(bytes)?;
    let (_, cert) = x509_parser::parse_x509_certificate(&der).ok()?;
    DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
}

/// DER bytes of the first certificate: the first `CERTIFICATE` PEM block, or the input
/// itself when it holds no PEM at all.
fn certificate_der(bytes: &[u8]) -> Option<Vec<u8>> {
    let blocks = pem::parse_many(bytes).ok()?;
    if blocks.is_empty() {
        return Some(bytes.to_vec());
    }

    blocks
        .into_iter()
        .find(|block| block.tag() == PEM_CERTIFICATE_TAG)
        .map(pem::Pem::into_contents)
}

#[cfg(test)]
#[path = "expiry_tests.rs"]
mod expiry_tests;
