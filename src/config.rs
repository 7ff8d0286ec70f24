// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration.
//!
//! Every flag can also be set through an environment variable, which is how the controller
//! is normally configured inside a Deployment:
//!
//! | Flag | Environment | Default |
//! |------|-------------|---------|
//! | `--force-tls` | `CERTER_FORCE_TLS` | `false` |
//! | `--require-annotation` | `CERTER_REQUIRE_ANNOTATION` | `true` |
//! | `--secret-namespace` | `CERTER_SECRET_NAMESPACE` | Ingress namespace |
//! | `--watch-namespace` | `CERTER_WATCH_NAMESPACE` | all namespaces |
//! | `--vault-addr` | `VAULT_ADDR` | required |
//! | `--vault-token` | `VAULT_TOKEN` | required |
//! | `--vault-mount` | `CERTER_VAULT_MOUNT` | `pki` |
//! | `--vault-role` | `CERTER_VAULT_ROLE` | required |
//! | `--issuer-mode` | `CERTER_ISSUER_MODE` | `csr` |
//! | `--cert-ttl` | `CERTER_CERT_TTL` | role default |
//! | `--renew-before-hours` | `CERTER_RENEW_BEFORE_HOURS` | `0` |
//! | `--max-concurrent-hosts` | `CERTER_MAX_CONCURRENT_HOSTS` | `1` |
//! | `--requeue-secs` | `CERTER_REQUEUE_SECS` | `3600` |
//! | `--metrics-addr` | `CERTER_METRICS_ADDR` | `0.0.0.0:8080` |

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_HOSTS, DEFAULT_METRICS_ADDR, DEFAULT_REQUEUE_SECS, DEFAULT_VAULT_MOUNT,
};
use crate::expiry::ExpiryGate;
use crate::issuer::{IssuerMode, VaultConfig};
use crate::reconcilers::ReconcileConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Longest accepted renewal window (10 years)
const MAX_RENEW_BEFORE_HOURS: i64 = 87_600;

/// certer - keeps Ingress TLS certificates issued and renewed from Vault PKI
#[derive(Parser, Clone, PartialEq, Eq)]
#[command(name = "certer", version, about, long_about = None)]
pub struct Cli {
    /// Manage every Ingress and cover every rule host, annotated or not
    #[arg(long, env = "CERTER_FORCE_TLS")]
    pub force_tls: bool,

    /// Require the opt-in annotation; `false` manages any Ingress with TLS entries
    #[arg(
        long,
        env = "CERTER_REQUIRE_ANNOTATION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub require_annotation: bool,

    /// Store every TLS secret in this namespace instead of the Ingress namespace
    #[arg(long, env = "CERTER_SECRET_NAMESPACE")]
    pub secret_namespace: Option<String>,

    /// Only watch Ingresses in this namespace
    #[arg(long, env = "CERTER_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Vault server address
    #[arg(long, env = "VAULT_ADDR")]
    pub vault_addr: String,

    /// Vault token
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: String,

    /// Mount path of the Vault PKI secrets engine
    #[arg(long, env = "CERTER_VAULT_MOUNT", default_value = DEFAULT_VAULT_MOUNT)]
    pub vault_mount: String,

    /// Vault PKI role used to issue certificates
    #[arg(long, env = "CERTER_VAULT_ROLE")]
    pub vault_role: String,

    /// How certificates are requested from Vault
    #[arg(long, env = "CERTER_ISSUER_MODE", value_enum, default_value_t = IssuerMode::Csr)]
    pub issuer_mode: IssuerMode,

    /// Requested certificate TTL (Vault duration, e.g. `720h`)
    #[arg(long, env = "CERTER_CERT_TTL")]
    pub cert_ttl: Option<String>,

    /// Reissue certificates this many hours before they expire
    #[arg(
        long,
        env = "CERTER_RENEW_BEFORE_HOURS",
        default_value_t = 0,
        value_parser = clap::value_parser!(i64).range(0..=MAX_RENEW_BEFORE_HOURS)
    )]
    pub renew_before_hours: i64,

    /// Number of TLS entries of one Ingress processed concurrently
    #[arg(
        long,
        env = "CERTER_MAX_CONCURRENT_HOSTS",
        default_value_t = DEFAULT_MAX_CONCURRENT_HOSTS,
        value_parser = parse_concurrency
    )]
    pub max_concurrent_hosts: usize,

    /// Seconds between passes over an Ingress that reconciled cleanly
    #[arg(long, env = "CERTER_REQUEUE_SECS", default_value_t = DEFAULT_REQUEUE_SECS)]
    pub requeue_secs: u64,

    /// Bind address of the metrics and health endpoint
    #[arg(long, env = "CERTER_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("force_tls", &self.force_tls)
            .field("require_annotation", &self.require_annotation)
            .field("secret_namespace", &self.secret_namespace)
            .field("watch_namespace", &self.watch_namespace)
            .field("vault_addr", &self.vault_addr)
            .field("vault_token", &"<redacted>")
            .field("vault_mount", &self.vault_mount)
            .field("vault_role", &self.vault_role)
            .field("issuer_mode", &self.issuer_mode)
            .field("cert_ttl", &self.cert_ttl)
            .field("renew_before_hours", &self.renew_before_hours)
            .field("max_concurrent_hosts", &self.max_concurrent_hosts)
            .field("requeue_secs", &self.requeue_secs)
            .field("metrics_addr", &self.metrics_addr)
            .finish()
    }
}

impl Cli {
    /// Per-pass reconciliation settings.
    #[must_use]
    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            force_all_hosts: self.force_tls,
            require_annotation: self.require_annotation,
            secret_namespace: non_blank(self.secret_namespace.as_deref()).map(ToString::to_string),
            expiry: ExpiryGate::new(chrono::Duration::hours(self.renew_before_hours)),
            max_concurrent_hosts: self.max_concurrent_hosts,
        }
    }

    /// Vault connection settings.
    #[must_use]
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            mount: self.vault_mount.clone(),
            ttl: non_blank(self.cert_ttl.as_deref()).map(ToString::to_string),
            ..VaultConfig::new(&self.vault_addr, &self.vault_token, &self.vault_role)
        }
    }

    /// Namespace to watch, or `None` for the whole cluster.
    #[must_use]
    pub fn watch_namespace(&self) -> Option<&str> {
        non_blank(self.watch_namespace.as_deref())
    }

    /// Requeue interval after a clean pass.
    #[must_use]
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
