use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    reconciles: Family<ResultLabels, Counter>,
    writes: Family<WriteLabels, Counter>,
    conflicts: Counter,
    invalid_selectors: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct WriteLabels {
    op: &'static str,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of ClusterNetworkPolicy reconciles by result",
            reconciles.clone(),
        );

        let writes = Family::default();
        reg.register(
            "network_policy_writes",
            "Count of NetworkPolicy creates, updates and deletes",
            writes.clone(),
        );

        let conflicts = Counter::default();
        reg.register(
            "conflicts",
            "Count of NetworkPolicies left untouched because another owner controls them",
            conflicts.clone(),
        );

        let invalid_selectors = Counter::default();
        reg.register(
            "invalid_selectors",
            "Count of reconciles that found an invalid namespace selector",
            invalid_selectors.clone(),
        );

        Self {
            reconciles,
            writes,
            conflicts,
            invalid_selectors,
        }
    }

    pub(crate) fn reconciled(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.reconciles
            .get_or_create(&ResultLabels { result })
            .inc();
    }

    pub(crate) fn created(&self) {
        self.wrote("create");
    }

    pub(crate) fn updated(&self) {
        self.wrote("update");
    }

    pub(crate) fn deleted(&self) {
        self.wrote("delete");
    }

    pub(crate) fn conflict(&self) {
        self.conflicts.inc();
    }

    pub(crate) fn invalid_selector(&self) {
        self.invalid_selectors.inc();
    }

    fn wrote(&self, op: &'static str) {
        self.writes.get_or_create(&WriteLabels { op }).inc();
    }
}
