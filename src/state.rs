//! The node's core API
//!
//! `State` owns the ledger, mempool, peer set and block storage, and is the
//! only way the HTTP handlers and the worker touch them. Every block that
//! enters the chain, mined here or proposed by a peer, goes through the same
//! validate-then-commit path.

use crate::blockchain::{
    apply_block_effects, hash_account_map, pow, validate_block, Account, AccountId, AccountMap,
    Block, BlockData, CancelToken, Ledger, PowArgs,
};
use crate::error::ChainError;
use crate::events::EventSink;
use crate::genesis::Genesis;
use crate::mempool::Mempool;
use crate::peer::{Peer, PeerSet, PeerStatus};
use crate::persistence::Persistence;
use crate::transaction::{BlockTx, SignedTx, ONE_UNIT_OF_GAS};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

const SOURCE: &str = "state";

/// Passed as `from` or `to` to mean the latest block number.
pub const QUERY_LATEST: u64 = u64::MAX;

/// The background side of a node, as seen by `State`.
pub trait Worker: Send + Sync {
    fn shutdown(&self);
    fn signal_start_mining(&self);
    fn signal_cancel_mining(&self);
    fn signal_share_tx(&self, tx: BlockTx);
}

pub struct StateConfig {
    pub beneficiary_id: AccountId,
    /// This node's private address, as peers know it.
    pub host: String,
    pub storage: Arc<dyn Persistence>,
    pub genesis: Genesis,
    pub select_strategy: String,
    pub known_peers: PeerSet,
    pub events: Arc<dyn EventSink>,
}

pub struct State {
    beneficiary_id: AccountId,
    host: String,
    events: Arc<dyn EventSink>,

    genesis: Genesis,
    mempool: Mempool,
    ledger: Ledger,
    storage: Arc<dyn Persistence>,
    known_peers: PeerSet,

    /// Serializes block commits so validation always sees the head it commits onto.
    commit_lock: Mutex<()>,
    worker: RwLock<Option<Arc<dyn Worker>>>,
}

impl State {
    /// Builds the node state and replays every stored block on top of genesis.
    /// A stored block that no longer validates is a fatal error.
    pub fn new(config: StateConfig) -> Result<Self, ChainError> {
        let ledger = Ledger::new(config.genesis.clone(), config.events.clone())?;
        let mempool = Mempool::with_strategy(&config.select_strategy)?;

        let state = State {
            beneficiary_id: config.beneficiary_id,
            host: config.host,
            events: config.events,
            genesis: config.genesis,
            mempool,
            ledger,
            storage: config.storage,
            known_peers: config.known_peers,
            commit_lock: Mutex::new(()),
            worker: RwLock::new(None),
        };

        state.replay()?;
        Ok(state)
    }

    fn replay(&self) -> Result<(), ChainError> {
        let blocks = self.storage.blocks()?;
        for data in blocks {
            let number = data.header.number;
            let block = Block::try_from(data)?;
            let accounts = validate_block(
                &block,
                &self.ledger.snapshot(),
                self.genesis.difficulty,
                self.events.as_ref(),
            )
            .map_err(|e| {
                self.events
                    .error(SOURCE, &format!("stored block {} failed validation: {}", number, e));
                e
            })?;
            self.ledger.commit(accounts, block);
        }

        let latest = self.ledger.latest_block();
        self.events.info(
            SOURCE,
            &format!(
                "chain loaded: latest block[{}] hash[{}]",
                latest.header.number,
                latest.hash_str()
            ),
        );
        Ok(())
    }

    /// Registers the worker; called once by the worker on startup.
    pub fn register_worker(&self, worker: Arc<dyn Worker>) {
        *self.worker.write() = Some(worker);
    }

    fn with_worker(&self, f: impl FnOnce(&dyn Worker)) {
        // Clone out of the lock so a worker call never runs under it.
        let worker = self.worker.read().clone();
        if let Some(worker) = worker {
            f(worker.as_ref());
        }
    }

    /// Stops the worker and closes storage. A running node joins its worker
    /// loops first so no commit is still in flight when storage goes away.
    pub fn shutdown(&self) -> Result<(), ChainError> {
        self.events.info(SOURCE, "shutdown started");
        self.with_worker(|worker| worker.shutdown());
        self.storage.close()?;
        self.events.info(SOURCE, "shutdown completed");
        Ok(())
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn beneficiary_id(&self) -> &AccountId {
        &self.beneficiary_id
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn accounts(&self) -> AccountMap {
        self.ledger.copy()
    }

    pub fn query_account(&self, account_id: &AccountId) -> Result<Account, ChainError> {
        self.ledger.query(account_id)
    }

    /// Every pending transaction, in the order the miner would pick them.
    pub fn mempool(&self) -> Vec<BlockTx> {
        self.mempool.pick_best(0)
    }

    pub fn mempool_length(&self) -> usize {
        self.mempool.count()
    }

    /// Accepts a transaction from a wallet, shares it with peers and wakes
    /// the miner.
    pub fn upsert_wallet_transaction(&self, signed: SignedTx) -> Result<(), ChainError> {
        signed.validate(self.genesis.chain_id)?;

        let tx = BlockTx::new(signed, self.genesis.gas_price, ONE_UNIT_OF_GAS);
        self.mempool.upsert(tx.clone())?;
        self.events
            .info(SOURCE, &format!("wallet transaction accepted: {}", tx.key()));

        self.with_worker(|worker| {
            worker.signal_share_tx(tx);
            worker.signal_start_mining();
        });
        Ok(())
    }

    /// Accepts a transaction forwarded by a peer. It is not shared again.
    pub fn upsert_node_transaction(&self, tx: BlockTx) -> Result<(), ChainError> {
        tx.validate(self.genesis.chain_id)?;
        self.mempool.upsert(tx)?;
        self.with_worker(|worker| worker.signal_start_mining());
        Ok(())
    }

    /// Validates and commits a block sent by a peer, then stops any local
    /// search that is now mining on a stale head.
    pub fn process_proposed_block(&self, data: BlockData) -> Result<(), ChainError> {
        self.events.info(
            SOURCE,
            &format!(
                "process proposed block: blk[{}]: hash[{}]",
                data.header.number,
                crate::crypto::hash_to_hex(&data.hash)
            ),
        );

        let block = Block::try_from(data)?;
        self.commit_block(block)?;

        self.with_worker(|worker| worker.signal_cancel_mining());
        Ok(())
    }

    /// Searches for the next block using the current mempool and commits it.
    /// Blocking; the worker runs it off the async runtime.
    pub fn mine_new_block(&self, cancel: &CancelToken) -> Result<Block, ChainError> {
        if self.mempool.count() == 0 {
            return Err(ChainError::NoTransactions);
        }

        // Pick and snapshot under the commit lock so both see the same head.
        let (transactions, snapshot) = {
            let _commit = self.commit_lock.lock();
            let snapshot = self.ledger.snapshot();
            let picked = self.mempool.pick_best(self.genesis.trans_per_block);
            (self.drop_committed(picked, &snapshot.accounts), snapshot)
        };
        if transactions.is_empty() {
            return Err(ChainError::NoTransactions);
        }

        let mut post_state = snapshot.accounts;
        apply_block_effects(
            &mut post_state,
            &self.beneficiary_id,
            self.genesis.mining_reward,
            &transactions,
            self.events.as_ref(),
        );

        self.events.info(
            SOURCE,
            &format!("mining started: numTrans[{}]", transactions.len()),
        );

        let block = pow(
            PowArgs {
                beneficiary_id: self.beneficiary_id.clone(),
                difficulty: self.genesis.difficulty,
                mining_reward: self.genesis.mining_reward,
                prev_block: snapshot.latest_block,
                state_root: hash_account_map(&post_state),
                transactions,
            },
            cancel,
            self.events.as_ref(),
        )?;

        if cancel.is_cancelled() {
            return Err(ChainError::MiningCancelled);
        }

        self.commit_block(block.clone())?;
        Ok(block)
    }

    /// Removes transactions whose nonce the ledger has already moved past;
    /// they can only come from a block that committed after they were pooled.
    fn drop_committed(&self, picked: Vec<BlockTx>, accounts: &AccountMap) -> Vec<BlockTx> {
        let (fresh, stale): (Vec<_>, Vec<_>) = picked.into_iter().partition(|tx| {
            accounts
                .get(&tx.from_id)
                .map_or(true, |account| tx.nonce > account.nonce)
        });

        if !stale.is_empty() {
            let keys: Vec<_> = stale.iter().map(BlockTx::key).collect();
            self.mempool.delete(&keys);
            self.events.warn(
                SOURCE,
                &format!("dropped {} already committed transactions", keys.len()),
            );
        }
        fresh
    }

    /// The single path a block takes into the chain.
    fn commit_block(&self, block: Block) -> Result<(), ChainError> {
        let _commit = self.commit_lock.lock();

        let accounts = validate_block(
            &block,
            &self.ledger.snapshot(),
            self.genesis.difficulty,
            self.events.as_ref(),
        )?;

        self.storage.write(&BlockData::from(&block))?;

        let keys: Vec<_> = block.transactions().iter().map(|tx| tx.key()).collect();
        self.mempool.delete(&keys);

        let (number, hash) = (block.header.number, block.hash_str());
        self.ledger.commit(accounts, block);

        self.events.info(
            SOURCE,
            &format!("block committed: blk[{}]: hash[{}]", number, hash),
        );
        Ok(())
    }

    pub fn latest_block(&self) -> Block {
        self.ledger.latest_block()
    }

    /// Stored blocks in `from..=to`; either bound may be `QUERY_LATEST`.
    /// Stops at the first number that is not stored.
    pub fn query_blocks_by_number(&self, from: u64, to: u64) -> Result<Vec<BlockData>, ChainError> {
        let latest = self.ledger.latest_block().header.number;
        let from = if from == QUERY_LATEST { latest } else { from.max(1) };
        let to = if to == QUERY_LATEST { latest } else { to };

        let mut out = Vec::new();
        for number in from..=to {
            match self.storage.get_block(number)? {
                Some(block) => out.push(block),
                None => break,
            }
        }
        Ok(out)
    }

    pub fn signal_cancel_mining(&self) {
        self.with_worker(|worker| worker.signal_cancel_mining());
    }

    /// Returns true when the peer was not known before.
    pub fn add_known_peer(&self, peer: Peer) -> bool {
        self.known_peers.add(peer)
    }

    /// Known peers other than this node.
    pub fn known_external_peers(&self) -> Vec<Peer> {
        self.known_peers.copy(&self.host)
    }

    pub fn status(&self) -> PeerStatus {
        let latest = self.ledger.latest_block();
        PeerStatus {
            latest_block_hash: latest.hash_str(),
            latest_block_number: latest.header.number,
            known_peers: self.known_external_peers(),
        }
    }
}
