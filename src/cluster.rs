// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster collaborator: the Kubernetes reads and writes the reconciler performs.
//!
//! The reconciler only talks to the cluster through [`ClusterApi`], so a pass can be driven
//! against an in-memory fake in tests. [`KubeClusterApi`] is the production implementation
//! on top of a [`kube::Client`]; every call goes through
//! [`retry_api_call`](crate::reconcilers::retry::retry_api_call) so transient API server
//! errors are retried before they surface as a [`ClusterError`].

use crate::reconcilers::retry::retry_api_call;
use crate::tls_errors::ClusterError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::debug;

const KIND_SECRET: &str = "Secret";
const KIND_INGRESS: &str = crate::constants::KIND_INGRESS;

/// Kubernetes operations needed by a reconciliation pass.
///
/// Secrets and Ingresses are addressed by namespace and name. A missing object is reported
/// as [`ClusterError::NotFound`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read a secret.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError>;

    /// Create a secret in `namespace`.
    async fn create_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, ClusterError>;

    /// Replace an existing secret. `secret` must carry its name and resource version.
    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, ClusterError>;

    /// Read an Ingress.
    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, ClusterError>;

    /// Replace an existing Ingress. `ingress` must carry its name and resource version.
    async fn replace_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> Result<Ingress, ClusterError>;
}

/// [`ClusterApi`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(
            || api.get(name),
            &format!("get secret {namespace}/{name}"),
        )
        .await
        .map_err(|e| cluster_error(KIND_SECRET, namespace, name, &e))
    }

    async fn create_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, ClusterError> {
        let name = object_name(secret.metadata.name.as_deref());
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams::default();

        debug!(namespace = namespace, name = name, "Creating secret");
        retry_api_call(
            || api.create(&params, secret),
            &format!("create secret {namespace}/{name}"),
        )
        .await
        .map_err(|e| cluster_error(KIND_SECRET, namespace, name, &e))
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, ClusterError> {
        let name = object_name(secret.metadata.name.as_deref());
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams::default();

        debug!(namespace = namespace, name = name, "Replacing secret");
        retry_api_call(
            || api.replace(name, &params, secret),
            &format!("replace secret {namespace}/{name}"),
        )
        .await
        .map_err(|e| cluster_error(KIND_SECRET, namespace, name, &e))
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Ingress, ClusterError> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        retry_api_call(
            || api.get(name),
            &format!("get ingress {namespace}/{name}"),
        )
        .await
        .map_err(|e| cluster_error(KIND_INGRESS, namespace, name, &e))
    }

    async fn replace_ingress(
        &self,
        namespace: &str,
        ingress: &Ingress,
    ) -> Result<Ingress, ClusterError> {
        let name = object_name(ingress.metadata.name.as_deref());
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams::default();

        debug!(namespace = namespace, name = name, "Replacing ingress");
        retry_api_call(
            || api.replace(name, &params, ingress),
            &format!("replace ingress {namespace}/{name}"),
        )
        .await
        .map_err(|e| cluster_error(KIND_INGRESS, namespace, name, &e))
    }
}

fn object_name(name: Option<&str>) -> &str {
    name.unwrap_or_default()
}

/// Translate a kube client error into a [`ClusterError`], keeping 404 distinguishable.
pub(crate) fn cluster_error(
    kind: &str,
    namespace: &str,
    name: &str,
    err: &kube::Error,
) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => ClusterError::Api {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
