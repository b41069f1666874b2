use crate::desired::MissingUid;
use std::fmt;

/// Fails a reconcile of a single ClusterNetworkPolicy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to fetch ClusterNetworkPolicy: {0}")]
    FetchPolicy(#[source] anyhow::Error),

    #[error("unable to list namespaces: {0}")]
    ListNamespaces(#[source] anyhow::Error),

    #[error(transparent)]
    Aggregate(Errors),
}

/// Fails the synchronization of a single namespace.
#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
    #[error("unable to fetch NetworkPolicy in namespace {namespace}: {source}")]
    Fetch {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to delete NetworkPolicy from namespace {namespace}: {source}")]
    Delete {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("conflicting NetworkPolicy detected in namespace {namespace}")]
    Conflict { namespace: String },

    #[error("failed to create/update NetworkPolicy in namespace {namespace}: {source}")]
    Apply {
        namespace: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unable to set owner of NetworkPolicy in namespace {namespace}: {source}")]
    Ownership {
        namespace: String,
        #[source]
        source: MissingUid,
    },
}

/// The per-namespace failures of one reconcile.
#[derive(Debug, Default)]
pub struct Errors(Vec<NamespaceError>);

// === impl NamespaceError ===

impl NamespaceError {
    pub fn namespace(&self) -> &str {
        match self {
            Self::Fetch { namespace, .. }
            | Self::Delete { namespace, .. }
            | Self::Conflict { namespace }
            | Self::Apply { namespace, .. }
            | Self::Ownership { namespace, .. } => namespace,
        }
    }
}

// === impl Errors ===

impl Errors {
    pub fn push(&mut self, error: NamespaceError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceError> {
        self.0.iter()
    }

    /// Returns `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(self))
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [error] = &self.0[..] {
            return error.fmt(f);
        }
        write!(f, "[")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            error.fmt(f)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for Errors {}
