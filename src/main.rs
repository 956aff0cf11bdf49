use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kubegraph::config::GraphConfig;
use kubegraph::k8s::client::ClusterClient;
use kubegraph::k8s::indexer::ResourceIndexer;
use kubegraph::server::{serve, ServerState};

#[derive(Parser, Debug)]
#[command(name = "kubegraph", about = "Kubernetes workload graph generator", version)]
struct Args {
    /// Path to the kubeconfig file. Omit to infer configuration from the
    /// environment (in-cluster or the default kubeconfig).
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Address for the HTTP/WebSocket surface.
    #[arg(long, default_value = "127.0.0.1:7420")]
    addr: SocketAddr,

    /// Directory for cached discovery responses.
    #[arg(long)]
    discovery_cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = GraphConfig {
        discovery_cache_dir: args.discovery_cache_dir.clone(),
        ..Default::default()
    };

    let client = ClusterClient::connect(args.kubeconfig.as_deref())
        .await
        .context("initialize cluster client")?;

    info!("initializing resource indexer");
    let indexer = ResourceIndexer::bootstrap(&client, &config)
        .await
        .context("bootstrap resource indexer")?;

    let state = Arc::new(ServerState::new(
        indexer.lister(),
        config.health_factory.clone(),
    ));

    serve(args.addr, state).await.context("run HTTP server")?;

    Ok(())
}
