use cluster_netpol_controller_k8s_api::ClusterNetworkPolicy;
use std::{fmt, sync::Arc};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    InvalidConfiguration,
    NetworkPolicyCreated,
    NetworkPolicyUpdated,
    NetworkPolicyDeleted,
    NetworkPolicyConflict,
}

/// An event recorded against a ClusterNetworkPolicy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub type_: EventType,
    pub reason: Reason,
    pub note: String,
}

/// Publishes events about a policy.
///
/// Recording is fire-and-forget: implementations log failures rather than
/// returning them so that a reconcile never fails because of an event.
#[async_trait::async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, policy: &ClusterNetworkPolicy, event: Event);
}

#[async_trait::async_trait]
impl<R: EventRecorder + ?Sized> EventRecorder for Arc<R> {
    async fn record(&self, policy: &ClusterNetworkPolicy, event: Event) {
        (**self).record(policy, event).await
    }
}

// === impl Event ===

impl Event {
    pub fn invalid_selector() -> Self {
        Self {
            type_: EventType::Warning,
            reason: Reason::InvalidConfiguration,
            note: "Invalid namespace selector".to_string(),
        }
    }

    pub fn created(namespace: &str) -> Self {
        Self {
            type_: EventType::Normal,
            reason: Reason::NetworkPolicyCreated,
            note: format!("NetworkPolicy created in namespace {namespace}"),
        }
    }

    pub fn updated(namespace: &str) -> Self {
        Self {
            type_: EventType::Normal,
            reason: Reason::NetworkPolicyUpdated,
            note: format!("NetworkPolicy updated in namespace {namespace}"),
        }
    }

    pub fn deleted(namespace: &str) -> Self {
        Self {
            type_: EventType::Normal,
            reason: Reason::NetworkPolicyDeleted,
            note: format!("NetworkPolicy deleted from namespace {namespace}"),
        }
    }

    pub fn conflict(namespace: &str) -> Self {
        Self {
            type_: EventType::Warning,
            reason: Reason::NetworkPolicyConflict,
            note: format!("NetworkPolicy conflict in namespace {namespace}"),
        }
    }
}

// === impl EventType ===

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl Reason ===

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "InvalidConfiguration",
            Self::NetworkPolicyCreated => "NetworkPolicyCreated",
            Self::NetworkPolicyUpdated => "NetworkPolicyUpdated",
            Self::NetworkPolicyDeleted => "NetworkPolicyDeleted",
            Self::NetworkPolicyConflict => "NetworkPolicyConflict",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
