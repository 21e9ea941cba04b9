mod cli;
mod error;
mod kubernetes;
mod policy;
mod reconcile;
mod types;
mod utils;

use clap::Parser;
use futures::stream::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{Config as WatcherConfig, Event, watcher};
use kube::{Api, Client, config};
use std::time::Duration;
use tracing::{info, warn};

use cli::Cli;
use kubernetes::{KubeStore, ResourceStore};
use reconcile::Reconciler;
use types::SeenPods;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = initialize_client(
        cli.context.clone(),
        cli.request_timeout.map(Duration::from_secs),
    )
    .await?;

    let reconciler = Reconciler::new(KubeStore::new(client.clone()), cli.create_sa_and_rolebinding);
    info!(
        "Starting podlogreader (create ServiceAccount and RoleBinding: {})",
        cli.create_sa_and_rolebinding
    );

    let pods_api: Api<Pod> = match &cli.namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    let cfg = WatcherConfig::default().labels(&reconciler.gate().selector());

    tokio::select! {
        res = watch_pods(pods_api, cfg, &reconciler) => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}

async fn initialize_client(
    context: Option<String>,
    timeout: Option<Duration>,
) -> anyhow::Result<Client> {
    let mut config = match context {
        Some(ctx) => config::Config::from_kubeconfig(&config::KubeConfigOptions {
            context: Some(ctx.clone()),
            ..Default::default()
        })
        .await
        .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?,
        None => config::Config::infer().await?,
    };
    if let Some(timeout) = timeout {
        config.read_timeout = Some(timeout);
        config.write_timeout = Some(timeout);
    }
    info!("Using cluster: {}", config.cluster_url);
    Ok(Client::try_from(config)?)
}

/// Turns the watch stream into typed pod events and reconciles them one at a time.
async fn watch_pods<S: ResourceStore>(
    pods_api: Api<Pod>,
    cfg: WatcherConfig,
    reconciler: &Reconciler<S>,
) -> anyhow::Result<()> {
    let mut seen = SeenPods::default();
    let mut stream = watcher(pods_api, cfg).default_backoff().boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(pod)) | Ok(Event::InitApply(pod)) => {
                reconciler.handle(seen.apply(pod)).await;
            }
            Ok(Event::Delete(pod)) => {
                reconciler.handle(seen.delete(pod)).await;
            }
            Ok(Event::Init) => {
                info!("Initializing pod watcher");
                seen.init();
            }
            Ok(Event::InitDone) => {
                seen.init_done();
                info!("Pod watcher initialization complete, tracking {} pods", seen.len());
            }
            Err(err) => warn!("Pod watcher error, retrying: {}", err),
        }
    }
    Ok(())
}
