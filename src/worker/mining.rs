use crate::blockchain::{BlockData, CancelToken};
use crate::error::ChainError;
use crate::network::PeerClient;
use crate::state::State;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const SOURCE: &str = "worker::mining";

/// One search at a time: the loop only starts a new search after the last
/// one has returned.
pub(super) async fn mining_loop(
    state: Arc<State>,
    client: Arc<dyn PeerClient>,
    period: Duration,
    start: Arc<Notify>,
    active: Arc<Mutex<Option<CancelToken>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let events = state.events().clone();
    events.info(SOURCE, "mining loop started");

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = start.notified() => {}
            _ = ticker.tick() => {}
        }

        if *shutdown.borrow() {
            break;
        }

        let mined = run_mining_operation(&state, client.as_ref(), &active, &shutdown).await;
        if mined && state.mempool_length() > 0 {
            start.notify_one();
        }
    }

    events.info(SOURCE, "mining loop stopped");
}

/// Returns true when the search ended in a way worth retrying right away.
async fn run_mining_operation(
    state: &Arc<State>,
    client: &dyn PeerClient,
    active: &Mutex<Option<CancelToken>>,
    shutdown: &watch::Receiver<bool>,
) -> bool {
    let events = state.events();
    if state.mempool_length() == 0 {
        return false;
    }

    let cancel = CancelToken::new();
    *active.lock() = Some(cancel.clone());
    if *shutdown.borrow() {
        cancel.cancel();
    }

    let search_state = state.clone();
    let search_cancel = cancel.clone();
    let result =
        tokio::task::spawn_blocking(move || search_state.mine_new_block(&search_cancel)).await;
    *active.lock() = None;

    match result {
        Ok(Ok(block)) => {
            let data = BlockData::from(&block);
            for peer in state.known_external_peers() {
                if let Err(e) = client.propose_block(&peer, &data).await {
                    events.warn(SOURCE, &format!("propose block to {}: {}", peer, e));
                }
            }
            true
        }
        Ok(Err(ChainError::MiningCancelled)) => {
            events.info(SOURCE, "mining cancelled");
            true
        }
        Ok(Err(ChainError::NoTransactions)) => {
            events.debug(SOURCE, "no transactions in mempool");
            false
        }
        Ok(Err(e)) => {
            events.warn(SOURCE, &format!("mining failed: {}", e));
            false
        }
        Err(e) => {
            events.error(SOURCE, &format!("mining task failed: {}", e));
            false
        }
    }
}
