// Copyright (c) 2026 Mesh Gossip Contributors. MIT License.
// See LICENSE for details.

//! # Mesh Gossip Node
//!
//! Entry point for the `meshgossip-node` binary. Parses CLI arguments,
//! initializes logging, loads or generates a node identity, joins the
//! overlay via the bundled reference TCP transport, drives the gossip
//! engine from a single task, and serves a thin ops HTTP surface.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the gossip node
//! - `init`    — generate and persist a keypair without joining the network
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod overlay;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use tokio::signal;
use tokio::sync::mpsc;

use meshgossip_core::config::HEARTBEAT_INTERVAL;
use meshgossip_core::crypto::Keypair;
use meshgossip_core::gossip::{Engine, InboundEvent};
use meshgossip_core::identity::NodeIdentity;

use api::{AppState, StatusSnapshot};
use cli::{Commands, MeshGossipCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use overlay::OverlayTcpSocket;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeshGossipCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// run — node startup sequence
// ---------------------------------------------------------------------------

/// Starts the gossip node: loads or generates its identity, binds the
/// reference overlay transport, drives the engine loop, and serves the ops
/// HTTP surface until a shutdown signal arrives.
///
/// Startup sequence:
/// 1.  Resolve data dir, init logging
/// 2.  Load or generate + persist the node identity
/// 3.  Construct the Gossip Engine
/// 4.  Bind the overlay TCP listener
/// 5.  Dial any `--peer` addresses given on the command line
/// 6.  Spawn the engine-loop task (ticks, inbound events, connections)
/// 7.  Serve `/health`, `/status`, `/metrics`
/// 8.  Await shutdown, broadcast LEAVE, exit
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let data_dir = cli::resolve_data_dir(&args.data_dir);
    let log_format = LogFormat::from_str_lossy(&args.log_format);
    let log_filter = format!(
        "meshgossip_node={level},meshgossip_core={level},tower_http=debug",
        level = args.log_level
    );
    logging::init_logging(&log_filter, log_format);

    tracing::info!(
        bind_addr = %args.bind_addr,
        http_addr = %args.http_addr,
        data_dir = %data_dir.display(),
        peers = args.peers.len(),
        ephemeral = args.ephemeral,
        "starting meshgossip-node"
    );

    let identity = if args.ephemeral {
        let identity = NodeIdentity::generate();
        tracing::info!(node_id = %hex::encode(identity.id()), "generated ephemeral identity");
        identity
    } else {
        load_or_generate_identity(&data_dir)?
    };

    let node_id_hex = hex::encode(identity.id());
    tracing::info!(node_id = %node_id_hex, "node identity ready");

    let engine = Engine::new(identity, Instant::now());

    let listener = tokio::net::TcpListener::bind(&args.bind_addr)
        .await
        .with_context(|| format!("failed to bind overlay listener on {}", args.bind_addr))?;
    tracing::info!(addr = %args.bind_addr, "overlay listener bound");

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<InboundEvent>();
    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel::<OverlayTcpSocket>();

    // Accept loop: hands freshly accepted sockets to the engine-loop task.
    {
        let conn_tx = conn_tx.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let socket = OverlayTcpSocket::new(stream, addr.ip());
                        if conn_tx.send(socket).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "overlay accept error");
                    }
                }
            }
        });
    }

    // Dial any statically configured peers.
    for peer_addr in args.peers.clone() {
        let conn_tx = conn_tx.clone();
        tokio::spawn(async move {
            match tokio::net::TcpStream::connect(&peer_addr).await {
                Ok(stream) => {
                    let ip = stream
                        .peer_addr()
                        .map(|a| a.ip())
                        .unwrap_or(IpAddr::from([0, 0, 0, 0]));
                    let socket = OverlayTcpSocket::new(stream, ip);
                    let _ = conn_tx.send(socket);
                }
                Err(err) => {
                    tracing::warn!(peer = %peer_addr, %err, "failed to dial configured peer");
                }
            }
        });
    }
    drop(conn_tx);

    let node_metrics = Arc::new(NodeMetrics::new());
    let status = Arc::new(RwLock::new(StatusSnapshot {
        node_id: node_id_hex,
        peer_count: 0,
        direct_connections: 0,
        diagnostics: Default::default(),
    }));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let engine_status = Arc::clone(&status);
    let engine_metrics = Arc::clone(&node_metrics);
    let engine_handle = tokio::spawn(async move {
        run_engine_loop(
            engine,
            inbound_tx,
            &mut conn_rx,
            &mut inbound_rx,
            engine_status,
            engine_metrics,
            shutdown_rx,
        )
        .await
    });

    let app_state = AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status,
        metrics: node_metrics,
    };
    let router = api::create_router(app_state);
    let http_listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .with_context(|| format!("failed to bind ops HTTP listener on {}", args.http_addr))?;
    tracing::info!(addr = %args.http_addr, "ops HTTP surface listening");

    tokio::select! {
        res = axum::serve(http_listener, router) => {
            if let Err(err) = res {
                tracing::error!(%err, "ops HTTP server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = engine_handle.await;

    tracing::info!("meshgossip-node stopped");
    Ok(())
}

/// Owns the [`Engine`] for its entire lifetime: the only task that ever
/// calls a `&mut self` method on it (§5 single-writer contract). Drains
/// inbound connections and messages, ticks on a timer, refreshes the
/// shared status snapshot, and broadcasts a signed LEAVE on shutdown.
async fn run_engine_loop(
    mut engine: Engine,
    inbound_tx: mpsc::UnboundedSender<InboundEvent>,
    conn_rx: &mut mpsc::UnboundedReceiver<OverlayTcpSocket>,
    inbound_rx: &mut mpsc::UnboundedReceiver<InboundEvent>,
    status: Arc<RwLock<StatusSnapshot>>,
    node_metrics: Arc<NodeMetrics>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                engine.tick(Instant::now());
            }
            Some(socket) = conn_rx.recv() => {
                engine.accept(socket, inbound_tx.clone());
            }
            Some(event) = inbound_rx.recv() => {
                match event {
                    InboundEvent::Message { conn_id, remote_ip, msg } => {
                        engine.handle_message(conn_id, remote_ip, msg, Instant::now());
                    }
                    InboundEvent::Closed { conn_id } => {
                        engine.handle_closed(conn_id);
                    }
                    InboundEvent::DecodeFailed { conn_id, reason } => {
                        tracing::trace!(conn_id, ?reason, "dropped undecodable frame");
                    }
                    InboundEvent::Accepted { conn_id, remote_ip } => {
                        tracing::debug!(conn_id, %remote_ip, "overlay connection accepted");
                        engine.handle_accepted(conn_id);
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    break;
                }
            }
        }

        refresh_status(&engine, &status, &node_metrics);
    }

    engine.shutdown().await;
}

fn refresh_status(engine: &Engine, status: &Arc<RwLock<StatusSnapshot>>, node_metrics: &Arc<NodeMetrics>) {
    let diagnostics = engine.diagnostics_snapshot();
    let peer_count = engine.peer_count();
    let direct = engine.direct_connection_count();

    node_metrics.sync_from(&diagnostics, direct, peer_count);

    let mut snapshot = status.write();
    snapshot.peer_count = peer_count;
    snapshot.direct_connections = direct;
    snapshot.diagnostics = diagnostics;
}

// ---------------------------------------------------------------------------
// init — identity generation
// ---------------------------------------------------------------------------

/// Generates and persists a new node identity at `{data_dir}/keys/node.key`
/// without joining the overlay.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("meshgossip_node=info", LogFormat::Pretty);

    let data_dir = cli::resolve_data_dir(&args.data_dir);
    tracing::info!(data_dir = %data_dir.display(), "initializing node identity");

    let keys_dir = data_dir.join("keys");
    let key_path = keys_dir.join("node.key");

    if key_path.exists() && !args.force {
        anyhow::bail!(
            "identity already initialized at {}. Use --force to overwrite.",
            key_path.display()
        );
    }

    std::fs::create_dir_all(&keys_dir)
        .with_context(|| format!("failed to create keys directory: {}", keys_dir.display()))?;

    let keypair = Keypair::generate();
    persist_keypair(&key_path, &keypair)?;

    let identity = NodeIdentity::from_keypair(keypair);

    println!();
    println!("Node initialized successfully.");
    println!();
    println!("  Data directory : {}", data_dir.display());
    println!("  Key file       : {}", key_path.display());
    println!("  Node id        : {}", hex::encode(identity.id()));
    println!();
    println!("Run `meshgossip-node run -d {}` to join the mesh.", data_dir.display());

    Ok(())
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

fn print_version() {
    println!("meshgossip-node {}", env!("CARGO_PKG_VERSION"));
}

// ---------------------------------------------------------------------------
// Identity persistence
// ---------------------------------------------------------------------------

/// Loads a node identity from `{data_dir}/keys/node.key`, or generates and
/// persists a new one if the key file does not exist.
///
/// Proof-of-work is re-solved on every load (§3) rather than persisted, so
/// there is no separate nonce file to get out of sync with the key.
fn load_or_generate_identity(data_dir: &std::path::Path) -> Result<NodeIdentity> {
    let keys_dir = data_dir.join("keys");
    let key_path = keys_dir.join("node.key");

    if key_path.exists() {
        let hex_str = std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read node key from {}", key_path.display()))?;
        let keypair = Keypair::from_hex(hex_str.trim())
            .map_err(|e| anyhow::anyhow!("invalid node key: {}", e))?;
        tracing::info!(key_path = %key_path.display(), "loaded node identity from disk");
        Ok(NodeIdentity::from_keypair(keypair))
    } else {
        std::fs::create_dir_all(&keys_dir)
            .with_context(|| format!("failed to create keys directory: {}", keys_dir.display()))?;
        let keypair = Keypair::generate();
        persist_keypair(&key_path, &keypair)?;
        tracing::info!(key_path = %key_path.display(), "generated and persisted new node identity");
        Ok(NodeIdentity::from_keypair(keypair))
    }
}

fn persist_keypair(key_path: &std::path::Path, keypair: &Keypair) -> Result<()> {
    std::fs::write(key_path, keypair.to_hex())
        .with_context(|| format!("failed to write node key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Shutdown signal
// ---------------------------------------------------------------------------

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
