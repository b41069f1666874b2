use crate::{
    desired, ControllerMetrics, Error, Errors, Event, EventRecorder, NamespaceError, Store,
};
use cluster_netpol_controller_core::{ConflictPolicy, NamespaceFilter};
use cluster_netpol_controller_k8s_api::{
    ClusterNetworkPolicy, Labels, Namespace, ResourceExt, Selector,
};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

const ACTIVE: &str = "Active";

/// Synchronizes the NetworkPolicies generated by a ClusterNetworkPolicy.
pub struct Reconciler<S, R> {
    store: S,
    recorder: R,
    filter: NamespaceFilter,
    resync: Duration,
    metrics: ControllerMetrics,
}

/// When a policy should be reconciled again.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    /// The policy no longer exists. Only a watch event brings it back.
    AwaitChange,
}

/// What happened to the generated NetworkPolicy in a matching namespace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

// === impl Reconciler ===

impl<S, R> Reconciler<S, R>
where
    S: Store,
    R: EventRecorder,
{
    pub fn new(
        store: S,
        recorder: R,
        filter: NamespaceFilter,
        resync: Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            store,
            recorder,
            filter,
            resync,
            metrics,
        }
    }

    pub fn filter(&self) -> &NamespaceFilter {
        &self.filter
    }

    /// Converges the NetworkPolicies generated by the named
    /// ClusterNetworkPolicy, returning when it should be reconciled again.
    ///
    /// Namespaces are processed independently: a failure in one namespace is
    /// recorded and the remaining namespaces are still processed.
    pub async fn reconcile(&self, name: &str) -> Result<Requeue, Error> {
        let res = self
            .reconcile_policy(name)
            .instrument(info_span!("reconcile", policy = %name))
            .await;
        self.metrics.reconciled(res.is_ok());
        res
    }

    async fn reconcile_policy(&self, name: &str) -> Result<Requeue, Error> {
        info!("Reconciliation started");

        let policy = match self.store.get_policy(name).await.map_err(Error::FetchPolicy)? {
            Some(policy) => policy,
            None => {
                debug!("ClusterNetworkPolicy not found");
                return Ok(Requeue::AwaitChange);
            }
        };

        let conflict = ConflictPolicy::from_annotations(policy.annotations());
        let namespaces = self
            .store
            .list_namespaces()
            .await
            .map_err(Error::ListNamespaces)?;
        let selector = self.selector(&policy).await;

        let mut errors = Errors::default();
        for ns in namespaces.iter().filter(|ns| is_active(ns)) {
            let namespace = ns.name_any();
            let matches = self.filter.in_scope(&namespace)
                && selector.matches(&Labels::from(ns.metadata.labels.clone()));

            let res = if matches {
                self.apply(&policy, &namespace, conflict).await.map(|_| ())
            } else {
                self.remove(&policy, &namespace).await
            };

            if let Err(error) = res {
                warn!(%namespace, %error, "Failed to synchronize NetworkPolicy");
                errors.push(error);
            }
        }
        errors.into_result()?;

        info!("Reconciliation successful");
        Ok(Requeue::After(self.resync))
    }

    /// Parses the policy's namespace selector. An invalid selector is reported
    /// on the policy and matches no namespace.
    async fn selector(&self, policy: &ClusterNetworkPolicy) -> Selector {
        match Selector::try_from(&policy.spec.namespace_selector) {
            Ok(selector) => selector,
            Err(error) => {
                error!(%error, "Invalid namespace selector");
                self.metrics.invalid_selector();
                self.recorder
                    .record(policy, Event::invalid_selector())
                    .await;
                Selector::nothing()
            }
        }
    }

    /// Creates or updates the generated NetworkPolicy in a matching namespace.
    async fn apply(
        &self,
        policy: &ClusterNetworkPolicy,
        namespace: &str,
        conflict: ConflictPolicy,
    ) -> Result<Outcome, NamespaceError> {
        let name = policy.name_any();
        let ownership = |source| NamespaceError::Ownership {
            namespace: namespace.to_string(),
            source,
        };
        let apply_failed = |source| NamespaceError::Apply {
            namespace: namespace.to_string(),
            source,
        };

        let existing = self
            .store
            .get_network_policy(namespace, &name)
            .await
            .map_err(|source| NamespaceError::Fetch {
                namespace: namespace.to_string(),
                source,
            })?;

        let Some(existing) = existing else {
            let np = desired::network_policy(policy, namespace).map_err(ownership)?;
            self.store
                .create_network_policy(namespace, &np)
                .await
                .map_err(apply_failed)?;
            self.metrics.created();
            self.recorder.record(policy, Event::created(namespace)).await;
            info!(%namespace, "NetworkPolicy created");
            return Ok(Outcome::Created);
        };

        if existing.metadata.uid.is_some()
            && !desired::is_controlled_by(&existing, policy)
            && !conflict.is_replace()
        {
            self.metrics.conflict();
            self.recorder.record(policy, Event::conflict(namespace)).await;
            return Err(NamespaceError::Conflict {
                namespace: namespace.to_string(),
            });
        }

        let mut np = existing.clone();
        desired::apply(&mut np, policy).map_err(ownership)?;
        if desired::equivalent(&existing, &np) {
            debug!(%namespace, "NetworkPolicy unchanged");
            return Ok(Outcome::Unchanged);
        }

        self.store
            .update_network_policy(namespace, &np)
            .await
            .map_err(apply_failed)?;
        self.metrics.updated();
        self.recorder.record(policy, Event::updated(namespace)).await;
        info!(%namespace, "NetworkPolicy updated");
        Ok(Outcome::Updated)
    }

    /// Deletes the generated NetworkPolicy from a namespace that no longer
    /// matches. NetworkPolicies this policy does not control are left alone.
    async fn remove(
        &self,
        policy: &ClusterNetworkPolicy,
        namespace: &str,
    ) -> Result<(), NamespaceError> {
        let name = policy.name_any();
        let existing = self
            .store
            .get_network_policy(namespace, &name)
            .await
            .map_err(|source| NamespaceError::Fetch {
                namespace: namespace.to_string(),
                source,
            })?;

        match existing {
            Some(np) if desired::is_controlled_by(&np, policy) => {}
            _ => return Ok(()),
        }

        self.store
            .delete_network_policy(namespace, &name)
            .await
            .map_err(|source| NamespaceError::Delete {
                namespace: namespace.to_string(),
                source,
            })?;
        self.metrics.deleted();
        self.recorder.record(policy, Event::deleted(namespace)).await;
        info!(%namespace, "NetworkPolicy deleted");
        Ok(())
    }
}

fn is_active(ns: &Namespace) -> bool {
    ns.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some(ACTIVE)
}
