use crate::network::PeerClient;
use crate::peer::Peer;
use crate::state::State;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const SOURCE: &str = "worker::peer";

pub(super) async fn peer_loop(
    state: Arc<State>,
    client: Arc<dyn PeerClient>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let events = state.events().clone();
    events.info(SOURCE, "peer update loop started");

    // The initial sync already ran, so the first round waits a full period.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => sync_with_peers(&state, client.as_ref()).await,
        }
    }

    events.info(SOURCE, "peer update loop stopped");
}

/// Asks every known peer for its status, learns the peers it knows, pulls
/// any blocks we are missing and finally announces this node to everyone.
/// A peer that fails is skipped for this round only.
pub(super) async fn sync_with_peers(state: &State, client: &dyn PeerClient) {
    let events = state.events();

    for peer in state.known_external_peers() {
        let status = match client.status(&peer).await {
            Ok(status) => status,
            Err(e) => {
                events.warn(SOURCE, &format!("status of {}: {}", peer, e));
                continue;
            }
        };

        events.debug(
            SOURCE,
            &format!(
                "peer {} at blk[{}] hash[{}]",
                peer, status.latest_block_number, status.latest_block_hash
            ),
        );

        add_new_peers(state, &status.known_peers);

        if status.latest_block_number > state.latest_block().header.number {
            write_peer_blocks(state, client, &peer).await;
        }
    }

    announce(state, client).await;
}

fn add_new_peers(state: &State, known_peers: &[Peer]) {
    for peer in known_peers {
        if peer.matches(state.host()) {
            continue;
        }
        if state.add_known_peer(peer.clone()) {
            state
                .events()
                .info(SOURCE, &format!("adding peer node {}", peer));
        }
    }
}

async fn write_peer_blocks(state: &State, client: &dyn PeerClient, peer: &Peer) {
    let events = state.events();
    let from = state.latest_block().header.number + 1;

    let blocks = match client.blocks_from(peer, from).await {
        Ok(blocks) => blocks,
        Err(e) => {
            events.warn(SOURCE, &format!("blocks from {}: {}", peer, e));
            return;
        }
    };

    for block in blocks {
        let number = block.header.number;
        match state.process_proposed_block(block) {
            Ok(()) => {}
            Err(e) if e.is_consensus() => {
                events.warn(
                    SOURCE,
                    &format!("block {} from {} rejected: {}", number, peer, e),
                );
                return;
            }
            Err(e) => {
                events.error(
                    SOURCE,
                    &format!("unable to write block {} from {}: {}", number, peer, e),
                );
                return;
            }
        }
    }
}

async fn announce(state: &State, client: &dyn PeerClient) {
    let me = Peer::new(state.host());
    for peer in state.known_external_peers() {
        if let Err(e) = client.announce(&peer, &me).await {
            state
                .events()
                .warn(SOURCE, &format!("announce to {}: {}", peer, e));
        }
    }
}
