#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod policy;

pub use self::{
    labels::{InvalidSelector, Labels, Selector},
    policy::{ClusterNetworkPolicy, ClusterNetworkPolicySpec},
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::Namespace,
        networking::v1::{NetworkPolicy, NetworkPolicySpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference, Time},
};
pub use kube::{
    api::{Api, ObjectMeta, ResourceExt},
    runtime::reflector::ObjectRef,
    Client, Resource,
};
