//! Synthesizes the NetworkPolicy a ClusterNetworkPolicy generates in a
//! namespace, and compares generated resources the way the API server stores
//! them.

use cluster_netpol_controller_k8s_api::{
    ClusterNetworkPolicy, NetworkPolicy, NetworkPolicySpec, ObjectMeta, OwnerReference, Resource,
    ResourceExt,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A ClusterNetworkPolicy that has not been persisted cannot own anything.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("ClusterNetworkPolicy {0} has no UID")]
pub struct MissingUid(String);

/// Builds the NetworkPolicy that `policy` generates in `namespace`.
pub fn network_policy(
    policy: &ClusterNetworkPolicy,
    namespace: &str,
) -> Result<NetworkPolicy, MissingUid> {
    let mut np = NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(policy.name_any()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    apply(&mut np, policy)?;
    Ok(np)
}

/// Makes `np` controlled by `policy` and overwrites its labels, annotations
/// and spec.
///
/// Controller references held by other owners are dropped; other owner
/// references are preserved in place.
pub fn apply(np: &mut NetworkPolicy, policy: &ClusterNetworkPolicy) -> Result<(), MissingUid> {
    let owner = owner_reference(policy)?;

    let refs = np.metadata.owner_references.get_or_insert_with(Vec::new);
    refs.retain(|r| r.uid == owner.uid || r.controller != Some(true));
    match refs.iter_mut().find(|r| r.uid == owner.uid) {
        Some(r) => *r = owner,
        None => refs.push(owner),
    }

    np.metadata.labels = policy.spec.labels.clone();
    np.metadata.annotations = policy.spec.annotations.clone();
    np.spec = Some(policy.spec.network_policy.clone());
    Ok(())
}

/// Returns true if `np` carries a controller reference to `policy`.
pub fn is_controlled_by(np: &NetworkPolicy, policy: &ClusterNetworkPolicy) -> bool {
    let Some(uid) = policy.uid() else {
        return false;
    };
    let kind = ClusterNetworkPolicy::kind(&());
    let name = policy.name_any();

    np.owner_references().iter().any(|r| {
        r.controller == Some(true) && r.kind == kind && r.name == name && r.uid == uid
    })
}

/// Returns true if `a` and `b` are the same object once the API server's
/// defaulting is taken into account.
///
/// Only the fields that [`apply`] writes are compared. Empty label and
/// annotation maps are equivalent to absent ones.
pub fn equivalent(a: &NetworkPolicy, b: &NetworkPolicy) -> bool {
    non_empty(&a.metadata.labels) == non_empty(&b.metadata.labels)
        && non_empty(&a.metadata.annotations) == non_empty(&b.metadata.annotations)
        && a.owner_references() == b.owner_references()
        && normalize(a.spec.as_ref()) == normalize(b.spec.as_ref())
}

fn owner_reference(policy: &ClusterNetworkPolicy) -> Result<OwnerReference, MissingUid> {
    policy
        .controller_owner_ref(&())
        .ok_or_else(|| MissingUid(policy.name_any()))
}

fn non_empty(map: &Option<BTreeMap<String, String>>) -> Option<&BTreeMap<String, String>> {
    map.as_ref().filter(|m| !m.is_empty())
}

/// Renders a spec the way the API server returns it: omitted fields are
/// dropped, `podSelector` is always present, ports default to TCP and
/// `policyTypes` is derived from the rules when unset.
fn normalize(spec: Option<&NetworkPolicySpec>) -> Value {
    let mut value = match spec.map(serde_json::to_value) {
        Some(Ok(value)) => value,
        _ => json!({}),
    };
    prune(&mut value);

    if let Value::Object(spec) = &mut value {
        spec.entry("podSelector").or_insert_with(|| json!({}));

        for direction in ["ingress", "egress"] {
            let rules = spec.get_mut(direction).and_then(Value::as_array_mut);
            for rule in rules.into_iter().flatten() {
                let ports = rule.get_mut("ports").and_then(Value::as_array_mut);
                for port in ports.into_iter().flatten().filter_map(Value::as_object_mut) {
                    port.entry("protocol").or_insert_with(|| json!("TCP"));
                }
            }
        }

        if !spec.contains_key("policyTypes") {
            let mut types = vec![json!("Ingress")];
            if spec.contains_key("egress") {
                types.push(json!("Egress"));
            }
            spec.insert("policyTypes".to_string(), Value::Array(types));
        }
    }

    value
}

/// Drops the members the API server omits when it serializes a stored
/// object: nulls, empty lists and empty `matchLabels` maps. Empty selector
/// objects are kept since `{}` selects everything.
fn prune(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.values_mut().for_each(prune);
            map.retain(|key, v| match v {
                Value::Null => false,
                Value::Array(items) => !items.is_empty(),
                Value::Object(members) if key == "matchLabels" => !members.is_empty(),
                _ => true,
            });
        }
        Value::Array(items) => items.iter_mut().for_each(prune),
        _ => {}
    }
}
