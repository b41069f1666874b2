use crate::{
    events::KubeRecorder,
    k8s::{Api, Client, ClusterNetworkPolicy, Namespace, NetworkPolicy, ResourceExt},
    reconcile::{self, ChangeMapper, NamespaceChanges, Reconciler, Requeue},
    store::KubeStore,
};
use futures::prelude::*;
use kube::runtime::{
    controller::{self, Action},
    watcher, WatchStreamExt,
};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

const MIN_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Runs the ClusterNetworkPolicy controller loop.
pub struct Controller {
    client: Client,
    ctx: Arc<Context>,
    mapper: ChangeMapper,
}

struct Context {
    reconciler: Reconciler<KubeStore, KubeRecorder>,
    backoff: Backoff,
}

/// Per-policy exponential backoff applied after failed reconciles.
#[derive(Debug)]
struct Backoff {
    min: Duration,
    max: Duration,
    failures: Mutex<HashMap<String, u32>>,
}

// === impl Controller ===

impl Controller {
    pub fn new(client: Client, reconciler: Reconciler<KubeStore, KubeRecorder>) -> Self {
        let mapper = ChangeMapper::new(reconciler.filter().clone());
        Self {
            client,
            ctx: Arc::new(Context {
                reconciler,
                backoff: Backoff::new(MIN_BACKOFF, MAX_BACKOFF),
            }),
            mapper,
        }
    }

    /// Reconciles policies until `shutdown` completes. In-flight reconciles
    /// are allowed to finish before this returns.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send + Sync + 'static) {
        let policies = Api::<ClusterNetworkPolicy>::all(self.client.clone());
        let network_policies = Api::<NetworkPolicy>::all(self.client.clone());

        let mut changes = NamespaceChanges::default();
        let namespaces =
            watcher(Api::<Namespace>::all(self.client.clone()), watcher::Config::default())
                .default_backoff()
                .try_filter_map(move |event| future::ready(Ok(changes.handle(event))));

        let controller = controller::Controller::new(policies, watcher::Config::default());
        let store = controller.store();
        let mapper = self.mapper.clone();
        let ctx = self.ctx.clone();

        controller
            .owns(network_policies, watcher::Config::default())
            .watches_stream(namespaces, move |ns| {
                let policies = store.state();
                debug!(namespace = %ns.name_any(), "Namespace labels changed");
                mapper.policies_for(&ns, policies.iter().map(|p| &**p))
            })
            .graceful_shutdown_on(shutdown)
            .run(reconcile, error_policy, self.ctx.clone())
            .for_each(|res| {
                match res {
                    Ok((obj, action)) => debug!(policy = %obj.name, ?action, "Reconciled"),
                    Err(error) => {
                        ctx.backoff.forget_deleted(&error);
                        warn!(%error, "Reconcile failed");
                    }
                }
                future::ready(())
            })
            .await;
        info!("Controller stopped");
    }
}

async fn reconcile(
    policy: Arc<ClusterNetworkPolicy>,
    ctx: Arc<Context>,
) -> Result<Action, reconcile::Error> {
    let name = policy.name_any();
    let requeue = ctx.reconciler.reconcile(&name).await?;
    ctx.backoff.reset(&name);
    Ok(match requeue {
        Requeue::After(resync) => Action::requeue(resync),
        Requeue::AwaitChange => Action::await_change(),
    })
}

fn error_policy(
    policy: Arc<ClusterNetworkPolicy>,
    error: &reconcile::Error,
    ctx: Arc<Context>,
) -> Action {
    let name = policy.name_any();
    let delay = ctx.backoff.next(&name);
    warn!(policy = %name, %error, ?delay, "Retrying failed reconcile");
    Action::requeue(delay)
}

// === impl Backoff ===

impl Backoff {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure and returns the delay before the next attempt.
    fn next(&self, key: &str) -> Duration {
        let mut failures = self.failures.lock();
        let attempt = failures.entry(key.to_string()).or_default();
        let delay = self
            .min
            .checked_mul(2u32.saturating_pow(*attempt))
            .map_or(self.max, |d| d.min(self.max));
        *attempt = attempt.saturating_add(1);
        delay
    }

    fn reset(&self, key: &str) {
        self.failures.lock().remove(key);
    }

    /// Drops the failure count of a policy that was deleted while failing.
    fn forget_deleted<E1, E2>(&self, error: &controller::Error<E1, E2>)
    where
        E1: std::error::Error + 'static,
        E2: std::error::Error + 'static,
    {
        if let controller::Error::ObjectNotFound(obj) = error {
            self.reset(&obj.name);
        }
    }
}
