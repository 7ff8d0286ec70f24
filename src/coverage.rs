// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS coverage of Ingress rule hosts.
//!
//! An Ingress declares routable hostnames in `spec.rules[].host` and the certificates
//! serving them in `spec.tls[]`. A host is *covered* when at least one TLS entry lists it.
//! This module computes the uncovered hosts and extends the TLS list with one entry per
//! uncovered host. Everything here is pure; persisting the result is the caller's job.
//!
//! # Example
//!
//! ```rust
//! use certer::coverage::{augment_spec, secret_name_for_host};
//! use k8s_openapi::api::networking::v1::{IngressRule, IngressSpec};
//!
//! let mut spec = IngressSpec {
//!     rules: Some(vec![IngressRule {
//!         host: Some("example.com".to_string()),
//!         ..Default::default()
//!     }]),
//!     ..Default::default()
//! };
//!
//! assert!(augment_spec(&mut spec));
//! let tls = spec.tls.unwrap();
//! assert_eq!(tls[0].secret_name.as_deref(), Some("example.com.tls"));
//! assert_eq!(secret_name_for_host("example.com"), "example.com.tls");
//! ```

use crate::constants::SECRET_NAME_SUFFIX;
use k8s_openapi::api::networking::v1::{IngressRule, IngressSpec, IngressTLS};
use std::collections::BTreeSet;
use tracing::debug;

/// Immutable set of hostnames claimed by TLS entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostSet(BTreeSet<String>);

impl HostSet {
    /// Collect every host listed by any of the given TLS entries.
    #[must_use]
    pub fn from_tls(entries: &[IngressTLS]) -> Self {
        entries
            .iter()
            .flat_map(|entry| entry.hosts.iter().flatten())
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.0.contains(host)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for HostSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Derive the secret name for a host's certificate: `<host>.tls`.
#[must_use]
pub fn secret_name_for_host(host: &str) -> String {
    format!("{host}{SECRET_NAME_SUFFIX}")
}

/// Routable rule hosts in declaration order, without duplicates.
///
/// Rules without a host (or with a blank host) match every hostname and cannot be
/// given a certificate by name, so they are skipped.
#[must_use]
pub fn rule_hosts(rules: &[IngressRule]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    rules
        .iter()
        .filter_map(|rule| rule.host.as_deref())
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .filter(|host| seen.insert(host.to_string()))
        .map(ToString::to_string)
        .collect()
}

/// Hosts declared by `rules` that no entry of `tls` covers, in rule order.
///
/// When the TLS entries outnumber the routable rule hosts the Ingress is treated as fully
/// covered and nothing is returned. That shape only arises from an earlier, inconsistent
/// augmentation; adding more single-host entries to it would keep growing the list.
#[must_use]
pub fn missing_hosts(rules: &[IngressRule], tls: &[IngressTLS]) -> Vec<String> {
    let hosts = rule_hosts(rules);

    if tls.len() > hosts.len() {
        debug!(
            tls_entries = tls.len(),
            rule_hosts = hosts.len(),
            "More TLS entries than rule hosts, treating coverage as complete"
        );
        return Vec::new();
    }

    let covered = HostSet::from_tls(tls);
    hosts
        .into_iter()
        .filter(|host| !covered.contains(host))
        .collect()
}

/// Append one single-host TLS entry for every uncovered rule host.
///
/// Existing entries are never removed or reordered. Returns `true` if the spec changed.
pub fn augment_spec(spec: &mut IngressSpec) -> bool {
    let rules = spec.rules.as_deref().unwrap_or_default();
    let tls = spec.tls.get_or_insert_with(Vec::new);

    let needed = missing_hosts(rules, tls);
    if needed.is_empty() {
        return false;
    }

    for host in needed {
        debug!(host = %host, "Adding TLS entry for uncovered host");
        tls.push(IngressTLS {
            secret_name: Some(secret_name_for_host(&host)),
            hosts: Some(vec![host]),
        });
    }

    true
}

#[cfg(test)]
#[path = "coverage_tests.rs"]
mod coverage_tests;
