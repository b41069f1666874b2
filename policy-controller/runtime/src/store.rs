use crate::{
    core::CONTROLLER_NAME,
    k8s::{Api, Client, ClusterNetworkPolicy, Namespace, NetworkPolicy, ResourceExt},
    reconcile::Store,
};
use anyhow::Result;
use kube::api::{DeleteParams, ListParams, PostParams};

/// A [`Store`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn network_policies(&self, namespace: &str) -> Api<NetworkPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get_policy(&self, name: &str) -> Result<Option<ClusterNetworkPolicy>> {
        let api = Api::<ClusterNetworkPolicy>::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let api = Api::<Namespace>::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<NetworkPolicy>> {
        Ok(self.network_policies(namespace).get_opt(name).await?)
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy> {
        let created = self
            .network_policies(namespace)
            .create(&Self::post_params(), np)
            .await?;
        Ok(created)
    }

    async fn update_network_policy(
        &self,
        namespace: &str,
        np: &NetworkPolicy,
    ) -> Result<NetworkPolicy> {
        // The object carries the resourceVersion it was read at, so a
        // concurrent modification fails with a conflict instead of being
        // overwritten.
        let updated = self
            .network_policies(namespace)
            .replace(&np.name_any(), &Self::post_params(), np)
            .await?;
        Ok(updated)
    }

    async fn delete_network_policy(&self, namespace: &str, name: &str) -> Result<()> {
        match self
            .network_policies(namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(error)) if error.code == 404 => {
                tracing::debug!(%namespace, %name, "NetworkPolicy already deleted");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}
