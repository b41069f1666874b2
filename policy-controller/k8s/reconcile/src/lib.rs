#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod changes;
pub mod desired;
mod error;
mod events;
mod metrics;
mod reconciler;
mod store;


pub use self::{
    changes::{ChangeMapper, NamespaceChanges},
    error::{Error, Errors, NamespaceError},
    events::{Event, EventRecorder, EventType, Reason},
    metrics::ControllerMetrics,
    reconciler::{Outcome, Reconciler, Requeue},
    store::Store,
};

/// How often every policy is reconciled when nothing else triggers it.
pub const DEFAULT_RESYNC_INTERVAL: std::time::Duration = std::time::Duration::from_secs(6 * 60 * 60);
