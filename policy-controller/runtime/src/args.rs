use crate::{
    controller::Controller,
    core::{Filters, Interval, NamespaceFilter, CONTROLLER_NAME},
    events::KubeRecorder,
    lease,
    reconcile::{ControllerMetrics, Reconciler},
    store::KubeStore,
};
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use futures::prelude::*;
use prometheus_client::registry::Registry;
use tokio::sync::oneshot;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "cluster-netpol",
    about = "Mirrors ClusterNetworkPolicies into per-namespace NetworkPolicies"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "cluster_netpol=info,warn",
        env = "CLUSTER_NETPOL_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespaces in which NetworkPolicies are never managed.
    ///
    /// Accepts comma-separated `name`, `prefix*` and `*suffix` patterns and
    /// may be repeated. Setting it replaces the default.
    #[clap(
        long,
        action = ArgAction::Append,
        default_value = "kube-*",
        env = "CLUSTER_NETPOL_EXCLUDE_NAMESPACES"
    )]
    exclude_namespaces: Vec<Filters>,

    /// Namespaces in which NetworkPolicies are managed. When unset, every
    /// namespace that is not excluded is managed.
    #[clap(
        long,
        action = ArgAction::Append,
        env = "CLUSTER_NETPOL_INCLUDE_NAMESPACES"
    )]
    include_namespaces: Vec<Filters>,

    /// How often every ClusterNetworkPolicy is reconciled regardless of
    /// changes.
    #[clap(long, default_value = "6h", env = "CLUSTER_NETPOL_RESYNC_INTERVAL")]
    resync_interval: Interval,

    /// Only run the controller while holding a Lease.
    #[clap(long, env = "CLUSTER_NETPOL_LEADER_ELECT")]
    leader_elect: bool,

    #[clap(long, default_value = CONTROLLER_NAME, env = "CLUSTER_NETPOL_LEASE_NAME")]
    lease_name: String,

    #[clap(long, env = "POD_NAMESPACE", default_value = "default")]
    lease_namespace: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            exclude_namespaces,
            include_namespaces,
            resync_interval,
            leader_elect,
            lease_name,
            lease_namespace,
        } = self;

        let filter = NamespaceFilter::new(
            exclude_namespaces.into_iter().collect(),
            include_namespaces.into_iter().collect(),
        );

        let mut prom = <Registry>::default();
        let metrics =
            ControllerMetrics::register(prom.sub_registry_with_prefix("cluster_netpol_controller"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(
            excluded = %filter.excluded,
            included = %filter.included,
            resync = %resync_interval,
            "Starting controller"
        );

        let hostname = std::env::var("HOSTNAME").ok();
        let claims = if leader_elect {
            let hostname = hostname
                .as_deref()
                .context("HOSTNAME must be set for leader election")?;
            let claims = lease::init(&runtime, &lease_namespace, &lease_name, hostname).await?;
            Some(claims)
        } else {
            None
        };

        let client = runtime.client();
        let reconciler = Reconciler::new(
            KubeStore::new(client.clone()),
            KubeRecorder::new(client.clone(), CONTROLLER_NAME, hostname.clone()),
            filter,
            resync_interval.into(),
            metrics,
        );
        let controller = Controller::new(client, reconciler);

        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                let res = match claims {
                    Some(claims) => {
                        let hostname = hostname.unwrap_or_default();
                        run_elected(controller, claims, hostname, drain).await
                    }
                    None => run(controller, drain).await,
                };
                if let Err(error) = res {
                    tracing::error!(%error, "Controller failed");
                }
            }
            .instrument(info_span!("controller")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

/// Runs the controller until the process is asked to shut down.
async fn run(controller: Controller, drain: drain::Watch) -> Result<()> {
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let ctrl = controller.run(close_rx.map(|_| ()));
    tokio::pin!(ctrl);

    tokio::select! {
        _ = (&mut ctrl) => {}
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(ctrl).await;
        }
    }
    Ok(())
}

/// Runs the controller only while this instance holds the lease.
async fn run_elected(
    controller: Controller,
    mut claims: lease::Claims,
    hostname: String,
    drain: drain::Watch,
) -> Result<()> {
    let signaled = drain.signaled();
    tokio::pin!(signaled);

    loop {
        tokio::select! {
            res = lease::acquired(&mut claims, &hostname) => res?,
            handle = &mut signaled => {
                drop(handle);
                return Ok(());
            }
        }
        info!(%hostname, "Acquired lease");

        let (close_tx, close_rx) = oneshot::channel::<()>();
        let ctrl = controller.run(close_rx.map(|_| ()));
        tokio::pin!(ctrl);

        tokio::select! {
            _ = (&mut ctrl) => return Ok(()),
            res = lease::lost(&mut claims, &hostname) => {
                res?;
                info!(%hostname, "Lost lease");
                let _ = close_tx.send(());
                ctrl.await;
            }
            handle = &mut signaled => {
                let _ = close_tx.send(());
                handle.release_after(ctrl).await;
                return Ok(());
            }
        }
    }
}
