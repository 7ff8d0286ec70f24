// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Writes issued key material into the TLS secret backing an Ingress TLS entry.

use crate::cluster::ClusterApi;
use crate::constants::{
    CONTROLLER_NAME, MANAGED_BY_LABEL, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY, TLS_SECRET_TYPE,
};
use crate::issuer::KeyPair;
use crate::tls_errors::SecretSyncError;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Store `pair` in secret `namespace/name`, creating the secret if it does not exist.
///
/// The existing secret keeps its other data keys, labels and type; only `tls.crt` and
/// `tls.key` are overwritten. A secret that cannot be fetched is treated as missing, so the
/// create call decides whether it really exists.
///
/// # Errors
///
/// Returns [`SecretSyncError::CreateFailed`] or [`SecretSyncError::UpdateFailed`] when the
/// write is rejected.
pub async fn sync_secret(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    pair: &KeyPair,
) -> Result<Secret, SecretSyncError> {
    let existing = match cluster.get_secret(namespace, name).await {
        Ok(secret) => Some(secret),
        Err(e) if e.is_not_found() => {
            info!(namespace = namespace, secret = name, "Secret not found, creating it");
            None
        }
        Err(e) => {
            warn!(
                namespace = namespace,
                secret = name,
                error = %e,
                "Failed to fetch secret, attempting to create it"
            );
            None
        }
    };

    match existing {
        Some(mut secret) => {
            set_key_pair(&mut secret, pair);
            debug!(namespace = namespace, secret = name, "Updating secret");
            cluster
                .replace_secret(namespace, &secret)
                .await
                .map_err(|source| SecretSyncError::UpdateFailed {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
        }
        None => {
            let mut secret = new_tls_secret(namespace, name);
            set_key_pair(&mut secret, pair);
            cluster
                .create_secret(namespace, &secret)
                .await
                .map_err(|source| SecretSyncError::CreateFailed {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    source,
                })
        }
    }
}

/// Empty `kubernetes.io/tls` secret labelled as managed by the controller.
fn new_tls_secret(namespace: &str, name: &str) -> Secret {
    let labels = BTreeMap::from([(MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string())]);

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some(TLS_SECRET_TYPE.to_string()),
        ..Default::default()
    }
}

fn set_key_pair(secret: &mut Secret, pair: &KeyPair) {
    let data = secret.data.get_or_insert_with(BTreeMap::new);
    data.insert(
        TLS_PRIVATE_KEY_KEY.to_string(),
        ByteString(pair.private.clone()),
    );
    data.insert(TLS_CERT_KEY.to_string(), ByteString(pair.public.clone()));
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod secrets_tests;
