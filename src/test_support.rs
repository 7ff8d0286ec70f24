// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests: certificates, Ingresses, Secrets and in-memory
//! collaborators.

use crate::cluster::ClusterApi;
use crate::constants::{TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::issuer::{certificate_hosts, CertificateIssuer, IssuerMode, KeyPair};
use crate::tls_errors::{ClusterError, IssuanceError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec, IngressTLS};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// A `notAfter` date far in the future
pub const FAR_FUTURE: (i32, u8, u8) = (2099, 1, 1);

/// A `notAfter` date long gone
pub const LONG_AGO: (i32, u8, u8) = (2001, 1, 1);

/// Mint a self-signed certificate for `hosts` expiring on `not_after` (year, month, day).
///
/// Returns `(certificate_pem, private_key_pem)`.
pub fn self_signed_pem(hosts: &[&str], not_after: (i32, u8, u8)) -> (String, String) {
    let (cert, key) = self_signed(hosts, not_after);
    (cert.pem(), key.serialize_pem())
}

/// Same as [`self_signed_pem`] but returns the DER certificate bytes.
pub fn self_signed_der(hosts: &[&str], not_after: (i32, u8, u8)) -> Vec<u8> {
    let (cert, _) = self_signed(hosts, not_after);
    cert.der().to_vec()
}

fn self_signed(hosts: &[&str], not_after: (i32, u8, u8)) -> (rcgen::Certificate, rcgen::KeyPair) {
    let names: Vec<String> = hosts.iter().map(ToString::to_string).collect();
    let mut params = rcgen::CertificateParams::new(names).expect("valid subject alt names");
    params.not_before = rcgen::date_time_ymd(2000, 1, 1);
    params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);

    let key = rcgen::KeyPair::generate().expect("key generation");
    let cert = params.self_signed(&key).expect("self-signed certificate");
    (cert, key)
}

/// Build an Ingress with the given rule hosts, TLS entries and annotations.
pub fn ingress(
    namespace: &str,
    name: &str,
    hosts: &[&str],
    tls: Option<Vec<IngressTLS>>,
    annotations: &[(&str, &str)],
) -> Ingress {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: (!annotations.is_empty()).then_some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(
                hosts
                    .iter()
                    .map(|host| IngressRule {
                        host: Some((*host).to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A TLS entry for `hosts` stored in `secret_name`.
pub fn tls_entry(hosts: &[&str], secret_name: &str) -> IngressTLS {
    IngressTLS {
        hosts: Some(hosts.iter().map(ToString::to_string).collect()),
        secret_name: Some(secret_name.to_string()),
    }
}

/// A TLS secret holding the given certificate and key.
pub fn tls_secret(namespace: &str, name: &str, cert: &[u8], key: &[u8]) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(TLS_CERT_KEY.to_string(), ByteString(cert.to_vec()));
    data.insert(TLS_PRIVATE_KEY_KEY.to_string(), ByteString(key.to_vec()));

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

type ObjectKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

fn api_failure(kind: &str, namespace: &str, name: &str, reason: &str) -> ClusterError {
    ClusterError::Api {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn not_found(kind: &str, namespace: &str, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn bump_resource_version(meta: &mut ObjectMeta) {
    let next = meta
        .resource_version
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    meta.resource_version = Some(next.to_string());
}

/// In-memory [`ClusterApi`] with injectable failures.
#[derive(Default)]
pub struct FakeCluster {
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    ingresses: Mutex<BTreeMap<ObjectKey, Ingress>>,
    failing_secret_reads: Mutex<BTreeSet<String>>,
    failing_secret_writes: Mutex<BTreeSet<String>>,
    failing_ingress_replace: Mutex<Option<usize>>,
    failing_ingress_get: Mutex<bool>,
    ingress_replacements: Mutex<Vec<Ingress>>,
    secret_writes: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `ingress` as the current cluster state.
    pub fn with_ingress(self, ingress: &Ingress) -> Self {
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let name = ingress.metadata.name.clone().unwrap_or_default();
        self.ingresses
            .lock()
            .unwrap()
            .insert((namespace, name), ingress.clone());
        self
    }

    /// Store `secret` as the current cluster state.
    pub fn with_secret(self, secret: Secret) -> Self {
        let namespace = secret.metadata.namespace.clone().unwrap_or_default();
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace, name), secret);
        self
    }

    /// Reads of the named secret fail with a non-404 error.
    pub fn fail_secret_read(self, name: &str) -> Self {
        self.failing_secret_reads
            .lock()
            .unwrap()
            .insert(name.to_string());
        self
    }

    /// Creates and updates of the named secret fail.
    pub fn fail_secret_write(self, name: &str) -> Self {
        self.failing_secret_writes
            .lock()
            .unwrap()
            .insert(name.to_string());
        self
    }

    /// The `nth` ingress replace call (1-based) fails.
    pub fn fail_ingress_replace(self, nth: usize) -> Self {
        *self.failing_ingress_replace.lock().unwrap() = Some(nth);
        self
    }

    /// Every ingress read fails.
    pub fn fail_ingress_get(self) -> Self {
        *self.failing_ingress_get.lock().unwrap() = true;
        self
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn secret_names(&self) -> Vec<ObjectKey> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }

    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.ingresses
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
    }

    /// Every ingress successfully written, in call order.
    pub fn ingress_replacements(&self) -> Vec<Ingress> {
        self.ingress_replacements.lock().unwrap().clone()
    }

    /// `create <ns>/<name>` or `replace <ns>/<name>` per successful secret write.
    pub fn secret_writes(&self) -> Vec<String> {
        self.secret_writes.lock().unwrap().clone()
    }

    /// Replace the stored ingress behind the reconciler's back.
    pub fn set_ingress(&self, ingress: Ingress) {
        let namespace = ingress.metadata.namespace.clone().unwrap_or_default();
        let name = ingress.metadata.name.clone().unwrap_or_default();
        self.ingresses
            .lock()
            .unwrap()
            .insert((namespace, name), ingress);
    }

    fn write_secret(&self, verb: &str, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        if self.failing_secret_writes.lock().unwrap().contains(&name) {
            return Err(api_failure("Secret", namespace, &name, "injected write failure"));
        }

        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        bump_resource_version(&mut stored.metadata);
        self.secrets
            .lock()
            .unwrap()
            .insert(key(namespace, &name), stored.clone());
        self.secret_writes
            .lock()
            .unwrap()
            .push(format!("{verb} {namespace}/{name}"));
        Ok(stored)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        if self.failing_secret_reads.lock().unwrap().contains(name) {
            return Err(api_failure("Secret", namespace, name, "injected read failure"));
        }
        self.secret(namespace, name)
            .ok_or_else(|| not_found("Secret", namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        if self.secret(namespace, &name).is_some() {
            return Err(api_failure("Secret", namespace, &name, "AlreadyExists"));
        }
        self.write_secret("create", namespace, secret)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        if self.secret(namespace, &name).is_none() {
            return Err(not_found("Secret", namespace, &name));
        }
        self.write_secret("replace", namespace, secret)
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, ClusterError> {
        if *self.failing_ingress_get.lock().unwrap() {
            return Err(api_failure("Ingress", namespace, name, "injected read failure"));
        }
        self.ingress(namespace, name)
            .ok_or_else(|| not_found("Ingress", namespace, name))
    }

    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress, ClusterError> {
        let name = ingress.metadata.name.clone().unwrap_or_default();
        let call = self.ingress_replacements.lock().unwrap().len() + 1;
        if *self.failing_ingress_replace.lock().unwrap() == Some(call) {
            return Err(api_failure("Ingress", namespace, &name, "injected write failure"));
        }

        let mut stored = ingress.clone();
        bump_resource_version(&mut stored.metadata);
        self.ingress_replacements.lock().unwrap().push(stored.clone());
        self.set_ingress(stored.clone());
        Ok(stored)
    }
}

/// In-memory [`CertificateIssuer`] minting self-signed certificates.
pub struct FakeIssuer {
    calls: Mutex<Vec<Vec<String>>>,
    failing: BTreeSet<String>,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self::failing_for(&[])
    }

    /// Issuance fails for the given primary hosts.
    pub fn failing_for(hosts: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: hosts.iter().map(ToString::to_string).collect(),
        }
    }

    /// Host lists of every issue call, primary host first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateIssuer for FakeIssuer {
    async fn issue(&self, primary_host: &str, all_hosts: &[String]) -> Result<KeyPair, IssuanceError> {
        let hosts = certificate_hosts(primary_host, all_hosts);
        self.calls.lock().unwrap().push(hosts.clone());

        if self.failing.contains(primary_host) {
            return Err(IssuanceError::Rejected {
                host: primary_host.to_string(),
                endpoint: "http://ca.test".to_string(),
                status_code: 400,
                reason: "injected rejection".to_string(),
            });
        }

        let names: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let (cert, key) = self_signed_pem(&names, FAR_FUTURE);
        Ok(KeyPair {
            public: cert.into_bytes(),
            private: key.into_bytes(),
        })
    }

    fn mode(&self) -> IssuerMode {
        IssuerMode::Csr
    }
}
