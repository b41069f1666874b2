use anyhow::Result;
use cluster_netpol_controller_k8s_api::{ClusterNetworkPolicy, Namespace, NetworkPolicy};
use std::sync::Arc;

/// Access to the cluster's object store.
///
/// Lookups return `Ok(None)` when the object does not exist. Deleting an
/// object that is already gone succeeds.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn get_policy(&self, name: &str) -> Result<Option<ClusterNetworkPolicy>>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    async fn get_network_policy(&self, namespace: &str, name: &str)
        -> Result<Option<NetworkPolicy>>;

    async fn create_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy>;

    /// Replaces an existing NetworkPolicy. The object's `resourceVersion` must
    /// match the stored object.
    async fn update_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy>;

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<()>;
}

#[async_trait::async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn get_policy(&self, name: &str) -> Result<Option<ClusterNetworkPolicy>> {
        (**self).get_policy(name).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        (**self).list_namespaces().await
    }

    async fn get_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NetworkPolicy>> {
        (**self).get_network_policy(namespace, name).await
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy> {
        (**self).create_network_policy(namespace, np).await
    }

    async fn update_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy> {
        (**self).update_network_policy(namespace, np).await
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<()> {
        (**self).delete_network_policy(namespace, name).await
    }
}
