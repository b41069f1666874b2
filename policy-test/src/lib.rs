#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

use cluster_netpol_controller_k8s_api::{
    self as k8s, ClusterNetworkPolicy, ClusterNetworkPolicySpec, LabelSelector, NetworkPolicy,
    NetworkPolicySpec, ResourceExt,
};
use maplit::{btreemap, convert_args};
use std::time::Duration;
use tracing::Instrument;

/// Label set on every namespace and policy created by a test. Its value is the
/// test namespace's name.
pub const TEST_LABEL: &str = "cluster-netpol-policy-test";

const FIELD_MANAGER: &str = "cluster-netpol-policy-test";

const TIMEOUT: Duration = Duration::from_secs(60);

/// Runs a test with a random namespace that is deleted on test completion.
///
/// ClusterNetworkPolicies labeled with the namespace's name are deleted too.
pub async fn with_temp_ns<F, Fut>(test: F)
where
    F: FnOnce(kube::Client, String) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let _tracing = init_tracing();

    let namespace = format!("cluster-netpol-test-{}", random_suffix(6));

    tracing::debug!("initializing client");
    let client = kube::Client::try_default()
        .await
        .expect("failed to initialize k8s client");
    let api = kube::Api::<k8s::Namespace>::all(client.clone());

    tracing::debug!(%namespace, "creating");
    let ns = k8s::Namespace {
        metadata: k8s::ObjectMeta {
            name: Some(namespace.clone()),
            labels: Some(convert_args!(btreemap!(
                TEST_LABEL => namespace.as_str(),
            ))),
            ..Default::default()
        },
        ..Default::default()
    };
    api.create(&post_params(), &ns)
        .await
        .expect("failed to create Namespace");

    tracing::trace!("spawning");
    let test = test(client.clone(), namespace.clone());
    let res = tokio::spawn(test.instrument(tracing::info_span!("test", %namespace))).await;
    if res.is_err() {
        // Keep the failure at the end of the log.
        drop(_tracing);
    }

    tracing::debug!(%namespace, "deleting policies");
    kube::Api::<ClusterNetworkPolicy>::all(client.clone())
        .delete_collection(
            &kube::api::DeleteParams::background(),
            &kube::api::ListParams::default().labels(&format!("{TEST_LABEL}={namespace}")),
        )
        .await
        .expect("failed to delete ClusterNetworkPolicies");

    tracing::debug!(%namespace, "deleting");
    api.delete(&namespace, &kube::api::DeleteParams::background())
        .await
        .expect("failed to delete Namespace");
    if let Err(err) = res {
        std::panic::resume_unwind(err.into_panic());
    }
}

/// Creates a namespaced resource.
pub async fn create<T>(client: &kube::Client, obj: T) -> T
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    T: serde::Serialize + serde::de::DeserializeOwned + Clone + std::fmt::Debug,
    T::DynamicType: Default,
{
    let ns = obj.namespace().expect("resource must be namespaced");
    let api = kube::Api::<T>::namespaced(client.clone(), &ns);
    tracing::trace!(?obj, "creating");
    api.create(&post_params(), &obj)
        .await
        .expect("failed to create resource")
}

/// Creates a ClusterNetworkPolicy labeled for cleanup by [`with_temp_ns`].
pub async fn create_policy(
    client: &kube::Client,
    ns: &str,
    mut policy: ClusterNetworkPolicy,
) -> ClusterNetworkPolicy {
    policy
        .labels_mut()
        .insert(TEST_LABEL.to_string(), ns.to_string());
    let api = kube::Api::<ClusterNetworkPolicy>::all(client.clone());
    tracing::trace!(?policy, "creating");
    api.create(&post_params(), &policy)
        .await
        .expect("failed to create ClusterNetworkPolicy")
}

/// Replaces the labels of a namespace, keeping the test label.
pub async fn set_namespace_labels(
    client: &kube::Client,
    ns: &str,
    mut labels: std::collections::BTreeMap<String, String>,
) {
    let api = kube::Api::<k8s::Namespace>::all(client.clone());
    let mut namespace = api.get(ns).await.expect("failed to get Namespace");
    labels.insert(TEST_LABEL.to_string(), ns.to_string());
    namespace.metadata.labels = Some(labels);
    api.replace(ns, &post_params(), &namespace)
        .await
        .expect("failed to update Namespace");
}

/// Waits for a namespaced resource to satisfy `cond`, panicking after a
/// timeout.
pub async fn await_condition<T>(
    client: &kube::Client,
    ns: &str,
    name: &str,
    cond: impl kube::runtime::wait::Condition<T>,
) -> Option<T>
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    T: serde::de::DeserializeOwned + Clone + std::fmt::Debug + Send + 'static,
    T::DynamicType: Default,
{
    let api = kube::Api::<T>::namespaced(client.clone(), ns);
    let cond = kube::runtime::wait::await_condition(api, name, cond);
    match tokio::time::timeout(TIMEOUT, cond).await {
        Ok(res) => res.expect("failed to watch resource"),
        Err(_) => panic!("timed out waiting for {name} in {ns}"),
    }
}

/// Waits for the named NetworkPolicy to exist and be controlled by the named
/// ClusterNetworkPolicy.
pub async fn await_owned_network_policy(
    client: &kube::Client,
    ns: &str,
    name: &str,
) -> NetworkPolicy {
    let policy = name.to_string();
    await_condition(client, ns, name, move |np: Option<&NetworkPolicy>| {
        np.is_some_and(|np| is_controlled_by(np, &policy))
    })
    .await
    .expect("NetworkPolicy must exist")
}

/// Waits for the named NetworkPolicy to be absent.
pub async fn await_network_policy_deleted(client: &kube::Client, ns: &str, name: &str) {
    await_condition(client, ns, name, |np: Option<&NetworkPolicy>| np.is_none()).await;
}

/// Waits until an event with `reason` has been recorded for the named
/// ClusterNetworkPolicy.
pub async fn await_policy_event(client: &kube::Client, policy: &str, reason: &str) {
    let api = kube::Api::<k8s::api::core::v1::Event>::all(client.clone());
    let params = kube::api::ListParams::default().fields(&format!(
        "involvedObject.kind=ClusterNetworkPolicy,involvedObject.name={policy},reason={reason}"
    ));
    let poll = async {
        loop {
            let events = api.list(&params).await.expect("failed to list Events");
            if !events.items.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    };
    if tokio::time::timeout(TIMEOUT, poll).await.is_err() {
        panic!("timed out waiting for {reason} event on {policy}");
    }
}

pub fn is_controlled_by(np: &NetworkPolicy, policy: &str) -> bool {
    np.owner_references().iter().any(|r| {
        r.controller == Some(true) && r.kind == "ClusterNetworkPolicy" && r.name == policy
    })
}

/// Builds a policy that selects namespaces carrying `labels`.
pub fn mk_policy(
    name: &str,
    labels: std::collections::BTreeMap<String, String>,
    spec: NetworkPolicySpec,
) -> ClusterNetworkPolicy {
    ClusterNetworkPolicy::new(
        name,
        ClusterNetworkPolicySpec {
            namespace_selector: LabelSelector {
                match_labels: Some(labels),
                ..Default::default()
            },
            network_policy: spec,
            ..Default::default()
        },
    )
}

/// A spec that denies all ingress to every pod.
pub fn deny_ingress() -> NetworkPolicySpec {
    NetworkPolicySpec {
        policy_types: Some(vec!["Ingress".to_string()]),
        ..Default::default()
    }
}

pub fn random_suffix(len: usize) -> String {
    use rand::Rng;

    let rng = &mut rand::thread_rng();
    (0..len)
        .map(|_| rng.sample(rand::distributions::Alphanumeric).to_ascii_lowercase() as char)
        .collect()
}

fn post_params() -> kube::api::PostParams {
    kube::api::PostParams {
        dry_run: false,
        field_manager: Some(FIELD_MANAGER.to_string()),
    }
}

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "cluster_netpol=trace,debug".parse().unwrap()),
            )
            .finish(),
    )
}
