use k8s_openapi::{
    api::networking::v1::NetworkPolicySpec,
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes a NetworkPolicy that is stamped into every selected namespace.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.desuuuu.com",
    version = "v1",
    kind = "ClusterNetworkPolicy",
    shortname = "cnp"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkPolicySpec {
    /// Labels to apply to the generated NetworkPolicy resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Annotations to apply to the generated NetworkPolicy resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    /// Restricts the namespaces in which NetworkPolicy resources are created.
    /// An empty selector matches all namespaces.
    #[serde(default)]
    pub namespace_selector: LabelSelector,

    #[serde(flatten)]
    pub network_policy: NetworkPolicySpec,
}
