//! Background workflows of a running node: mining, peer updates and
//! transaction sharing.
//!
//! `NodeWorker::run` registers the worker with `State`, syncs with the origin
//! peers and spawns one tokio task per loop. The handle only owns the sending
//! side of each signal; the tasks own the `State`.

mod mining;
mod peer;
mod share;

use crate::blockchain::CancelToken;
use crate::events::EventSink;
use crate::network::PeerClient;
use crate::state::{State, Worker};
use crate::transaction::BlockTx;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

const SOURCE: &str = "worker";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub peer_update_interval: Duration,
    pub mining_interval: Duration,
    pub tx_share_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            peer_update_interval: Duration::from_secs(10),
            mining_interval: Duration::from_secs(5),
            tx_share_capacity: 100,
        }
    }
}

pub struct NodeWorker {
    events: Arc<dyn EventSink>,
    start_mining: Arc<Notify>,
    active_search: Arc<Mutex<Option<CancelToken>>>,
    tx_share: mpsc::Sender<BlockTx>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Receiving ends handed to the loops.
struct Receivers {
    tx_share: mpsc::Receiver<BlockTx>,
    shutdown: watch::Receiver<bool>,
}

impl NodeWorker {
    fn new(config: &WorkerConfig, events: Arc<dyn EventSink>) -> (Arc<Self>, Receivers) {
        let (tx_share, tx_share_rx) = mpsc::channel(config.tx_share_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Arc::new(NodeWorker {
            events,
            start_mining: Arc::new(Notify::new()),
            active_search: Arc::new(Mutex::new(None)),
            tx_share,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        });

        (
            worker,
            Receivers {
                tx_share: tx_share_rx,
                shutdown: shutdown_rx,
            },
        )
    }

    /// Starts the worker for `state` and returns once the initial sync is done.
    pub async fn run(
        state: Arc<State>,
        client: Arc<dyn PeerClient>,
        config: WorkerConfig,
    ) -> Arc<NodeWorker> {
        let events = state.events().clone();
        let (worker, receivers) = NodeWorker::new(&config, events.clone());
        state.register_worker(worker.clone());

        events.info(SOURCE, "initial sync started");
        peer::sync_with_peers(&state, client.as_ref()).await;
        events.info(SOURCE, "initial sync completed");

        let mining = tokio::spawn(mining::mining_loop(
            state.clone(),
            client.clone(),
            config.mining_interval,
            worker.start_mining.clone(),
            worker.active_search.clone(),
            receivers.shutdown.clone(),
        ));
        let peers = tokio::spawn(peer::peer_loop(
            state.clone(),
            client.clone(),
            config.peer_update_interval,
            receivers.shutdown.clone(),
        ));
        let share = tokio::spawn(share::share_loop(
            state,
            client,
            receivers.tx_share,
            receivers.shutdown,
        ));

        worker.tasks.lock().extend([mining, peers, share]);
        worker
    }

    /// Signals every loop to stop and waits until they have exited. A block
    /// search that already found its block finishes committing first.
    pub async fn stop(&self) {
        Worker::shutdown(self);
        self.wait().await;
    }

    /// Waits for every loop to exit after `shutdown`.
    pub async fn wait(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                self.events
                    .error(SOURCE, &format!("worker task failed: {}", e));
            }
        }
    }

    pub fn is_mining(&self) -> bool {
        self.active_search.lock().is_some()
    }
}

impl Worker for NodeWorker {
    fn shutdown(&self) {
        self.events.info(SOURCE, "shutdown requested");
        self.signal_cancel_mining();
        self.shutdown.send_replace(true);
    }

    /// Stores a permit when the miner is busy, so the request is not lost.
    fn signal_start_mining(&self) {
        self.start_mining.notify_one();
        self.events.debug(SOURCE, "mining signaled");
    }

    fn signal_cancel_mining(&self) {
        if let Some(cancel) = self.active_search.lock().as_ref() {
            cancel.cancel();
            self.events.info(SOURCE, "mining cancel signaled");
        }
    }

    fn signal_share_tx(&self, tx: BlockTx) {
        match self.tx_share.try_send(tx) {
            Ok(()) => self.events.debug(SOURCE, "share tx signaled"),
            Err(TrySendError::Full(tx)) => self.events.warn(
                SOURCE,
                &format!("share queue full, transaction {} not shared", tx.key()),
            ),
            Err(TrySendError::Closed(_)) => {
                self.events.debug(SOURCE, "share loop stopped, transaction not shared")
            }
        }
    }
}
