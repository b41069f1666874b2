#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod conflict;
pub mod duration;
pub mod filter;

pub use self::{
    conflict::ConflictPolicy,
    duration::Interval,
    filter::{Filters, InvalidFilter, NamespaceFilter},
};

/// The name under which the controller records events and claims leases.
pub const CONTROLLER_NAME: &str = "clusternetworkpolicy-controller";
