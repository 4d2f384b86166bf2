//! Standalone DHT node process: loads configuration, binds a UDP socket,
//! bootstraps against the configured seeds, and runs the receive and
//! maintenance loops until killed.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use mldht_core::adapters::{SystemClock, TokioUdpSocket};
use mldht_core::config::DhtConfig;
use mldht_core::domain::NodeId;
use mldht_core::ports::ConfigProvider;
use mldht_core::service::{self, DhtNode};

fn load_config() -> anyhow::Result<DhtConfig> {
    let path = std::env::args().nth(1);
    let config = match path {
        Some(path) => mldht_core::adapters::TomlConfigProvider::load(&path)
            .with_context(|| format!("loading config from {path}"))?
            .load(),
        None => {
            tracing::info!("no config path given, running with defaults");
            DhtConfig::default()
        }
    };
    Ok(config)
}

// `rt-multi-thread` isn't in this crate's tokio feature set (the engine
// mutex serializes state access regardless of worker count), so run on
// the single-threaded flavor the `rt` feature actually provides.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;
    let local_id = config.node_id.unwrap_or_else(NodeId::random);
    let bootstrap_nodes: Vec<SocketAddr> = config.bootstrap_nodes.clone();

    let socket = TokioUdpSocket::bind(config.udp_port)
        .await
        .with_context(|| format!("binding UDP port {}", config.udp_port))?;
    tracing::info!(?local_id, port = config.udp_port, "listening");

    let node = Arc::new(DhtNode::new(local_id, config, socket, SystemClock::new()));

    let receiver = Arc::clone(&node);
    let receive_loop = tokio::spawn(async move { receiver.run().await });

    let maintenance = Arc::clone(&node);
    let maintenance_loop = tokio::spawn(async move {
        service::maintenance::run_forever(maintenance.as_ref(), 30).await
    });

    if !bootstrap_nodes.is_empty() {
        match mldht_core::bootstrap::bootstrap(node.as_ref(), &bootstrap_nodes).await {
            Ok(reached) => tracing::info!(reached, "bootstrap complete"),
            Err(e) => tracing::warn!(error = %e, "bootstrap failed"),
        }
    }

    tokio::select! {
        result = receive_loop => {
            result.context("receive loop task panicked")?.context("receive loop exited")?;
        }
        result = maintenance_loop => {
            result.context("maintenance loop task panicked")?;
        }
    }

    Ok(())
}
