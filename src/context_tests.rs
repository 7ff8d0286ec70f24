// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::GEN_CERTS_ANNOTATION;
    use crate::test_support::{ingress, tls_entry, FakeCluster, FakeIssuer};

    const REQUEUE: Duration = Duration::from_secs(3600);

    fn context(cluster: FakeCluster, issuer: FakeIssuer) -> Context {
        Context::new(
            Arc::new(cluster),
            Arc::new(issuer),
            ReconcileConfig::default(),
            REQUEUE,
        )
    }

    fn annotated(hosts: &[&str]) -> Ingress {
        let tls = hosts
            .iter()
            .map(|h| tls_entry(&[*h], &format!("{h}.tls")))
            .collect();
        ingress("web", "shop", hosts, Some(tls), &[(GEN_CERTS_ANNOTATION, "true")])
    }

    #[tokio::test]
    async fn test_clean_pass_uses_requeue_interval() {
        let ing = annotated(&["a.com"]);
        let ctx = context(FakeCluster::new().with_ingress(&ing), FakeIssuer::new());

        let result = ctx.reconcile(&ing).await;

        assert_eq!(pass_outcome(&result), PassOutcome::Reconciled);
        assert_eq!(ctx.requeue_after(&result.unwrap()), REQUEUE);
    }

    #[tokio::test]
    async fn test_partial_pass_requeues_quickly() {
        let ing = annotated(&["a.com", "b.com"]);
        let ctx = context(
            FakeCluster::new().with_ingress(&ing),
            FakeIssuer::failing_for(&["b.com"]),
        );

        let result = ctx.reconcile(&ing).await;

        assert_eq!(pass_outcome(&result), PassOutcome::Partial);
        assert_eq!(
            ctx.requeue_after(&result.unwrap()),
            Duration::from_secs(ERROR_REQUEUE_DURATION_SECS)
        );
    }

    #[tokio::test]
    async fn test_ineligible_pass() {
        let ing = ingress("web", "shop", &["a.com"], None, &[]);
        let ctx = context(FakeCluster::new().with_ingress(&ing), FakeIssuer::new());

        let result = ctx.reconcile(&ing).await;

        assert_eq!(pass_outcome(&result), PassOutcome::NothingToDo);
        assert_eq!(ctx.requeue_after(&result.unwrap()), REQUEUE);
    }

    #[tokio::test]
    async fn test_failed_pass() {
        let ing = annotated(&["a.com"]);
        let ctx = context(
            FakeCluster::new().with_ingress(&ing).fail_ingress_get(),
            FakeIssuer::new(),
        );

        let result = ctx.reconcile(&ing).await;

        assert_eq!(pass_outcome(&result), PassOutcome::Error);
    }
}
