#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use cluster_netpol_controller_core as core;
pub use cluster_netpol_controller_k8s_api as k8s;
pub use cluster_netpol_controller_k8s_reconcile as reconcile;

mod args;
mod controller;
mod events;
mod lease;
mod store;

pub use self::{args::Args, controller::Controller, events::KubeRecorder, store::KubeStore};
