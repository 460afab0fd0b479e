//! Sortis agreement node.
//!
//! Runs one participant of the BA★ agreement protocol against a static
//! peer list.
//!
//! # Usage
//!
//! ```bash
//! # A four-node local quorum, one process per line
//! sortis-node --listen 127.0.0.1:3001 \
//!     --peer 127.0.0.1:3002 --peer 127.0.0.1:3003 --peer 127.0.0.1:3004
//! ```
//!
//! Identities are the port substrings of the addresses, so every node
//! derives the same sorted participant registry. Startup fails fatally with
//! fewer than 4 participants or when the listen address cannot be bound.

use anyhow::{bail, Context, Result};
use clap::Parser;
use sortis_agreement::AgreementConfig;
use sortis_node::{LinkVerifier, NodeStateMachine};
use sortis_production::network::{PeerClient, RpcServer};
use sortis_production::Runner;
use sortis_types::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sortis agreement node.
///
/// Runs one participant of the replicated agreement protocol.
#[derive(Parser, Debug)]
#[command(name = "sortis-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on (host:port); the port is this node's identity
    #[arg(long)]
    listen: String,

    /// Peer address (host:port); repeat once per peer
    #[arg(long = "peer", required = true)]
    peers: Vec<String>,

    /// Round timer interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    round_interval_ms: u64,

    /// Agreement timer interval between steps 2-4 in milliseconds
    #[arg(long, default_value_t = 10000)]
    step_interval_ms: u64,

    /// Step-5 polling interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    step5_poll_interval_ms: u64,

    /// Committee size k for sortition
    #[arg(long, default_value_t = 2)]
    committee_size: u64,

    /// Event channel capacity
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 2t+1 Byzantine quorums need at least 4 participants.
    if cli.peers.len() < 3 {
        bail!("Need at least 4 nodes to achieve Byzantine fault tolerance");
    }

    let user_id = UserId::from_address(&cli.listen);
    let mut participants: Vec<UserId> = cli.peers.iter().map(|p| UserId::from_address(p)).collect();
    participants.push(user_id.clone());
    participants.sort();
    if participants.windows(2).any(|w| w[0] == w[1]) {
        bail!("Duplicate participant identity; every port must be unique");
    }
    info!(user = %user_id, participants = ?participants, "Participant registry");

    let config = AgreementConfig {
        round_interval: Duration::from_millis(cli.round_interval_ms),
        step_interval: Duration::from_millis(cli.step_interval_ms),
        step5_poll_interval: Duration::from_millis(cli.step5_poll_interval_ms),
        committee_size: cli.committee_size,
        ..AgreementConfig::default()
    };

    let node = NodeStateMachine::new(
        user_id.clone(),
        &participants,
        config,
        Arc::new(LinkVerifier),
    );

    let peers: Vec<PeerClient> = cli.peers.iter().map(PeerClient::new).collect();
    for peer in &peers {
        info!(peer = %peer.user_id(), addr = peer.addr(), "Registered peer");
    }

    let (inbound_tx, inbound_rx) = mpsc::channel(cli.channel_capacity);
    let server = RpcServer::bind(&cli.listen, inbound_tx)
        .await
        .with_context(|| format!("could not create listening socket on {}", cli.listen))?;
    let server_handle = server.spawn();

    let runner = Runner::new(node, peers, inbound_rx, cli.channel_capacity);
    let (runner_handle, shutdown) = runner.spawn();

    info!(user = %user_id, "Node started; waiting for ctrl-c");
    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!("Shutting down");
    shutdown.shutdown();
    let _ = runner_handle.await;
    server_handle.abort();

    Ok(())
}
