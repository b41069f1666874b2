use crate::{
    k8s::{Client, ClusterNetworkPolicy, Resource},
    reconcile::{self, EventRecorder},
};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

const ACTION: &str = "Reconcile";

/// Publishes policy events through the Kubernetes events API.
#[derive(Clone)]
pub struct KubeRecorder {
    recorder: Recorder,
}

impl KubeRecorder {
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl EventRecorder for KubeRecorder {
    async fn record(&self, policy: &ClusterNetworkPolicy, event: reconcile::Event) {
        let reconcile::Event {
            type_,
            reason,
            note,
        } = event;
        let event = Event {
            type_: match type_ {
                reconcile::EventType::Normal => EventType::Normal,
                reconcile::EventType::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(note),
            action: ACTION.to_string(),
            secondary: None,
        };

        if let Err(error) = self.recorder.publish(&event, &policy.object_ref(&())).await {
            warn!(%reason, %error, "Failed to publish event");
        }
    }
}
