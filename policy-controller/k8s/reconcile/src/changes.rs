use cluster_netpol_controller_core::NamespaceFilter;
use cluster_netpol_controller_k8s_api::{ClusterNetworkPolicy, Labels, Namespace, ObjectRef, ResourceExt};
use kube::runtime::watcher;
use std::collections::{HashMap, HashSet};

/// Maps namespace label changes to the policies that must be reconciled.
#[derive(Clone, Debug)]
pub struct ChangeMapper {
    filter: NamespaceFilter,
}

/// Tracks the labels of every namespace seen on a watch so that label changes
/// can be told apart from other updates.
///
/// Deleted namespaces are forgotten, so a namespace that is re-created with
/// the same name is treated as new.
#[derive(Debug, Default)]
pub struct NamespaceChanges {
    labels: HashMap<String, Labels>,
    relisted: Option<HashSet<String>>,
}

// === impl ChangeMapper ===

impl ChangeMapper {
    pub fn new(filter: NamespaceFilter) -> Self {
        Self { filter }
    }

    /// Returns the policies to reconcile after `new` is observed.
    ///
    /// `old` is the previously observed state of the namespace, if any. No
    /// work is produced unless the labels changed and the namespace is in
    /// scope.
    pub fn on_namespace_label_change<'p>(
        &self,
        old: Option<&Namespace>,
        new: &Namespace,
        policies: impl IntoIterator<Item = &'p ClusterNetworkPolicy>,
    ) -> Vec<ObjectRef<ClusterNetworkPolicy>> {
        let old = old.map(labels);
        if !labels_changed(old.as_ref(), &labels(new)) {
            return Vec::new();
        }
        self.policies_for(new, policies)
    }

    /// Returns every policy if the namespace is in scope.
    pub fn policies_for<'p>(
        &self,
        ns: &Namespace,
        policies: impl IntoIterator<Item = &'p ClusterNetworkPolicy>,
    ) -> Vec<ObjectRef<ClusterNetworkPolicy>> {
        if !self.filter.in_scope(&ns.name_any()) {
            return Vec::new();
        }
        policies.into_iter().map(ObjectRef::from_obj).collect()
    }
}

// === impl NamespaceChanges ===

impl NamespaceChanges {
    /// Consumes a namespace watch event, returning the namespace if its labels
    /// differ from the last time it was seen.
    pub fn handle(&mut self, event: watcher::Event<Namespace>) -> Option<Namespace> {
        match event {
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                None
            }
            watcher::Event::InitApply(ns) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(ns.name_any());
                }
                self.observe(ns)
            }
            watcher::Event::InitDone => {
                if let Some(relisted) = self.relisted.take() {
                    self.labels.retain(|name, _| relisted.contains(name));
                }
                None
            }
            watcher::Event::Apply(ns) => self.observe(ns),
            watcher::Event::Delete(ns) => {
                self.labels.remove(&ns.name_any());
                None
            }
        }
    }

    fn observe(&mut self, ns: Namespace) -> Option<Namespace> {
        let new = labels(&ns);
        let old = self.labels.insert(ns.name_any(), new.clone());
        if labels_changed(old.as_ref(), &new) {
            Some(ns)
        } else {
            None
        }
    }
}

fn labels(ns: &Namespace) -> Labels {
    Labels::from(ns.metadata.labels.clone())
}

/// A namespace that has not been seen before counts as changed.
fn labels_changed(old: Option<&Labels>, new: &Labels) -> bool {
    old.is_none_or(|old| old != new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_netpol_controller_core::Filters;
    use cluster_netpol_controller_k8s_api::{ClusterNetworkPolicySpec, ObjectMeta};
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn namespace(name: &str, labels: Option<Vec<(&str, &str)>>) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: labels.map(|ls| {
                    ls.into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn policies() -> Vec<ClusterNetworkPolicy> {
        ["a", "b"]
            .into_iter()
            .map(|name| ClusterNetworkPolicy::new(name, ClusterNetworkPolicySpec::default()))
            .collect()
    }

    fn mapper() -> ChangeMapper {
        ChangeMapper::new(NamespaceFilter::new(
            "kube-*".parse::<Filters>().unwrap(),
            Filters::default(),
        ))
    }

    #[test]
    fn label_change_enqueues_every_policy() {
        let old = namespace("ns1", Some(vec![("env", "dev")]));
        let new = namespace("ns1", Some(vec![("env", "prod")]));
        let policies = policies();

        let refs = mapper().on_namespace_label_change(Some(&old), &new, &policies);
        assert_eq!(
            refs,
            vec![
                ObjectRef::<ClusterNetworkPolicy>::new("a"),
                ObjectRef::<ClusterNetworkPolicy>::new("b"),
            ]
        );
    }

    #[test]
    fn unchanged_labels_are_ignored() {
        let old = namespace("ns1", Some(vec![("env", "dev")]));
        let mut new = old.clone();
        new.metadata.annotations = Some(btreemap! { "a".to_string() => "b".to_string() });

        let refs = mapper().on_namespace_label_change(Some(&old), &new, &policies());
        assert!(refs.is_empty());

        let old = namespace("ns1", None);
        let new = namespace("ns1", Some(vec![]));
        let refs = mapper().on_namespace_label_change(Some(&old), &new, &policies());
        assert!(refs.is_empty(), "absent and empty labels are equal");
    }

    #[test]
    fn first_observation_is_a_change() {
        let new = namespace("ns1", None);
        let refs = mapper().on_namespace_label_change(None, &new, &policies());
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn out_of_scope_namespaces_are_ignored() {
        let old = namespace("kube-system", Some(vec![("env", "dev")]));
        let new = namespace("kube-system", Some(vec![("env", "prod")]));
        let refs = mapper().on_namespace_label_change(Some(&old), &new, &policies());
        assert!(refs.is_empty());
    }

    #[test]
    fn tracks_label_changes_over_a_watch() {
        let mut changes = NamespaceChanges::default();
        let name = |ns: Option<Namespace>| ns.map(|ns| ns.name_any());

        assert_eq!(changes.handle(watcher::Event::Init), None);
        assert_eq!(
            name(changes.handle(watcher::Event::InitApply(namespace("ns1", None)))),
            Some("ns1".to_string())
        );
        assert_eq!(changes.handle(watcher::Event::InitDone), None);

        // Annotation-only updates produce nothing.
        let mut annotated = namespace("ns1", None);
        annotated.metadata.annotations = Some(btreemap! { "a".to_string() => "b".to_string() });
        assert_eq!(name(changes.handle(watcher::Event::Apply(annotated))), None);

        let relabeled = namespace("ns1", Some(vec![("env", "prod")]));
        assert_eq!(
            name(changes.handle(watcher::Event::Apply(relabeled.clone()))),
            Some("ns1".to_string())
        );
        assert_eq!(name(changes.handle(watcher::Event::Apply(relabeled.clone()))), None);

        // Deletions produce nothing, and a re-created namespace is new again.
        assert_eq!(
            name(changes.handle(watcher::Event::Delete(relabeled.clone()))),
            None
        );
        assert_eq!(
            name(changes.handle(watcher::Event::Apply(relabeled))),
            Some("ns1".to_string())
        );
    }

    #[test]
    fn relist_forgets_missing_namespaces() {
        let mut changes = NamespaceChanges::default();
        changes.handle(watcher::Event::Apply(namespace("ns1", None)));
        changes.handle(watcher::Event::Apply(namespace("ns2", None)));

        changes.handle(watcher::Event::Init);
        assert!(changes
            .handle(watcher::Event::InitApply(namespace("ns1", None)))
            .is_none());
        changes.handle(watcher::Event::InitDone);

        assert!(changes
            .handle(watcher::Event::Apply(namespace("ns2", None)))
            .is_some());
    }
}
