//! Node boot sequence: wires configuration, storage, state, worker and the
//! two HTTP servers together, then waits for a shutdown signal.

use crate::config::Config;
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::events::tracing_sink;
use crate::genesis::Genesis;
use crate::network::HttpPeerClient;
use crate::peer::{Peer, PeerSet};
use crate::persistence::Database;
use crate::state::{State, StateConfig};
use crate::worker::NodeWorker;
use std::fs;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("starting bundchain node");

    // The beneficiary key decides which account is credited for mined blocks.
    let keypair = KeyPair::load(&config.state.beneficiary_key)?;
    let genesis = Genesis::load(&config.state.genesis_path)?;

    let known_peers = PeerSet::new();
    for host in &config.state.origin_peers {
        known_peers.add(Peer::new(host.as_str()));
    }
    known_peers.add(Peer::new(config.web.private_addr.as_str()));

    let db_path = std::path::Path::new(&config.state.db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
        }
    }
    let storage = Arc::new(Database::open(&config.state.db_path)?);

    let state = Arc::new(State::new(StateConfig {
        beneficiary_id: keypair.account_id(),
        host: config.web.private_addr.clone(),
        storage,
        genesis,
        select_strategy: config.state.select_strategy.clone(),
        known_peers,
        events: tracing_sink(),
    })?);
    info!(beneficiary = %state.beneficiary_id(), host = %state.host(), "state ready");

    let client = Arc::new(HttpPeerClient::new()?);
    let worker = NodeWorker::run(state.clone(), client, (&config.worker).into()).await;

    let public = TcpListener::bind(&config.web.public_addr).await?;
    let private = TcpListener::bind(&config.web.private_addr).await?;
    info!(addr = %config.web.public_addr, "http public service start");
    info!(addr = %config.web.private_addr, "http private service start");

    let (stop_tx, stop_rx) = watch::channel(false);
    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let mut public_srv = tokio::spawn(crate::api::serve(
        public,
        crate::api::public_router(state.clone()),
        stopped(stop_rx.clone()),
    ));
    let mut private_srv = tokio::spawn(crate::api::serve(
        private,
        crate::api::private_router(state.clone()),
        stopped(stop_rx),
    ));

    let mut failure: Option<ChainError> = None;
    tokio::select! {
        res = &mut public_srv => failure = Some(server_error("public", res)),
        res = &mut private_srv => failure = Some(server_error("private", res)),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("unable to listen for shutdown signal: {}", e);
            }
            info!("shutdown started");
        }
    }

    stop_tx.send_replace(true);
    let timeout = config.web.shutdown_timeout();
    for (name, srv) in [("public", public_srv), ("private", private_srv)] {
        if srv.is_finished() {
            continue;
        }
        if tokio::time::timeout(timeout, srv).await.is_err() {
            warn!("{} server did not stop within {:?}", name, timeout);
        }
    }

    worker.stop().await;
    state.shutdown()?;
    info!("shutdown complete");

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn server_error(
    name: &str,
    res: Result<Result<(), ChainError>, tokio::task::JoinError>,
) -> ChainError {
    let err = match res {
        Ok(Ok(())) => ChainError::NetworkError(format!("{} server stopped", name)),
        Ok(Err(e)) => e,
        Err(e) => ChainError::NetworkError(format!("{} server task failed: {}", name, e)),
    };
    error!("server error: {}", err);
    err
}
