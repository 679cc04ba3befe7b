use crate::network::PeerClient;
use crate::state::State;
use crate::transaction::BlockTx;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

const SOURCE: &str = "worker::share";

/// Forwards each queued transaction to every known peer, best effort.
pub(super) async fn share_loop(
    state: Arc<State>,
    client: Arc<dyn PeerClient>,
    mut queue: mpsc::Receiver<BlockTx>,
    mut shutdown: watch::Receiver<bool>,
) {
    let events = state.events().clone();
    events.info(SOURCE, "share tx loop started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            tx = queue.recv() => {
                let Some(tx) = tx else {
                    break;
                };
                for peer in state.known_external_peers() {
                    if let Err(e) = client.submit_tx(&peer, &tx).await {
                        events.warn(SOURCE, &format!("share tx {} with {}: {}", tx.key(), peer, e));
                    }
                }
            }
        }
    }

    events.info(SOURCE, "share tx loop stopped");
}
