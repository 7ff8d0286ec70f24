// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use certer::issuer::{certificate_hosts, CertificateIssuer, IssuerMode, KeyPair};
use certer::tls_errors::IssuanceError;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let labels = BTreeMap::from([
        ("test".to_string(), "integration".to_string()),
        ("managed-by".to_string(), "certer-test".to_string()),
    ]);
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Issuer that mints self-signed certificates locally, standing in for Vault.
#[derive(Default)]
pub struct SelfSignedIssuer {
    issued: AtomicUsize,
}

impl SelfSignedIssuer {
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CertificateIssuer for SelfSignedIssuer {
    async fn issue(
        &self,
        primary_host: &str,
        all_hosts: &[String],
    ) -> Result<KeyPair, IssuanceError> {
        let failed = |reason: String| IssuanceError::KeyGeneration {
            host: primary_host.to_string(),
            reason,
        };

        let params = rcgen::CertificateParams::new(certificate_hosts(primary_host, all_hosts))
            .map_err(|e| failed(e.to_string()))?;
        let key = rcgen::KeyPair::generate().map_err(|e| failed(e.to_string()))?;
        let cert = params.self_signed(&key).map_err(|e| failed(e.to_string()))?;

        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(KeyPair {
            public: cert.pem().into_bytes(),
            private: key.serialize_pem().into_bytes(),
        })
    }

    fn mode(&self) -> IssuerMode {
        IssuerMode::Csr
    }
}
