//! Cancellable proof-of-work search
//!
//! A search is a pure function of its arguments: it builds the candidate
//! header once, then walks the nonce until the header hash clears the
//! difficulty target. Mutual exclusion between searches is the caller's job.

use crate::blockchain::{AccountId, Block, BlockHeader};
use crate::crypto::{hash_to_hex, Sha256Hash};
use crate::error::ChainError;
use crate::events::EventSink;
use crate::merkle::MerkleTree;
use crate::transaction::BlockTx;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SOURCE: &str = "pow";

/// How many hash attempts run between two looks at the cancellation token.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Shared flag that stops a running search. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    Idle,
    Searching,
    Found,
    Cancelled,
    Errored,
}

pub struct PowArgs {
    pub beneficiary_id: AccountId,
    pub difficulty: u32,
    pub mining_reward: u64,
    pub prev_block: Block,
    pub state_root: Sha256Hash,
    pub transactions: Vec<BlockTx>,
}

/// Tracks one search through its states; terminal states are final.
struct Search<'a> {
    state: MiningState,
    events: &'a dyn EventSink,
}

impl<'a> Search<'a> {
    fn transition(&mut self, next: MiningState) {
        self.events
            .debug(SOURCE, &format!("mining state {:?} -> {:?}", self.state, next));
        self.state = next;
    }
}

/// Seals a new block on top of `args.prev_block`.
pub fn pow(
    args: PowArgs,
    cancel: &CancelToken,
    events: &dyn EventSink,
) -> Result<Block, ChainError> {
    let mut search = Search {
        state: MiningState::Idle,
        events,
    };

    if args.difficulty > 256 {
        search.transition(MiningState::Errored);
        return Err(ChainError::InvalidBlock(format!(
            "difficulty {} exceeds 256 bits",
            args.difficulty
        )));
    }

    let merkle_tree = MerkleTree::new(args.transactions);
    let prev_hash = args.prev_block.hash();

    let mut header = BlockHeader {
        number: args.prev_block.header.number + 1,
        prev_block_hash: prev_hash,
        timestamp: chrono::Utc::now().timestamp_millis() as u64,
        beneficiary_id: args.beneficiary_id,
        difficulty: args.difficulty,
        mining_reward: args.mining_reward,
        state_root: args.state_root,
        trans_root: merkle_tree.root(),
        // Random start so competing miners do not walk the same nonces.
        nonce: rand::thread_rng().gen(),
    };

    search.transition(MiningState::Searching);
    let target = Block::hash_to_target(args.difficulty);
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;

        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            search.transition(MiningState::Cancelled);
            return Err(ChainError::MiningCancelled);
        }

        if attempts % PROGRESS_INTERVAL == 0 {
            events.info(SOURCE, &format!("mining running: attempts[{}]", attempts));
        }

        let hash = header.hash();
        if hash > target {
            header.nonce = header.nonce.wrapping_add(1);
            continue;
        }

        if cancel.is_cancelled() {
            search.transition(MiningState::Cancelled);
            return Err(ChainError::MiningCancelled);
        }

        events.info(
            SOURCE,
            &format!(
                "mining solved: prevBlk[{}]: newBlk[{}]: numTrans[{}]: attempts[{}]",
                hash_to_hex(&prev_hash),
                hash_to_hex(&hash),
                merkle_tree.len(),
                attempts
            ),
        );
        search.transition(MiningState::Found);

        return Ok(Block {
            header,
            merkle_tree,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::events::null_sink;
    use crate::events::testing::RecordingSink;
    use crate::transaction::UserTx;

    fn args(difficulty: u32) -> PowArgs {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();
        let signed = UserTx::new(1, 1, alice.account_id(), bob, 10, 1, vec![]).sign(&alice);

        PowArgs {
            beneficiary_id: KeyPair::generate().account_id(),
            difficulty,
            mining_reward: 700,
            prev_block: Block::empty(),
            state_root: [3u8; 32],
            transactions: vec![BlockTx::new(signed, 15, 1)],
        }
    }

    #[test]
    fn test_sealed_block_satisfies_difficulty() {
        let block = pow(args(8), &CancelToken::new(), null_sink().as_ref()).unwrap();
        assert!(Block::is_hash_solved(8, &block.hash()));
        assert_eq!(block.header.number, 1);
        assert_eq!(block.header.prev_block_hash, Block::empty().hash());
        assert_eq!(block.header.trans_root, block.merkle_tree.root());
        assert_eq!(block.header.state_root, [3u8; 32]);
    }

    #[test]
    fn test_cancelled_search_returns_error() {
        let cancel = CancelToken::new();
        cancel.cancel();

        // 256 bits can never be solved, so only cancellation ends the search.
        let sink = RecordingSink::default();
        let result = pow(args(256), &cancel, &sink);
        assert_eq!(result.unwrap_err(), ChainError::MiningCancelled);
        assert!(sink.contains("Searching -> Cancelled"));
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();

        let handle = std::thread::spawn(move || pow(args(256), &remote, null_sink().as_ref()));
        std::thread::sleep(std::time::Duration::from_millis(50));
        cancel.cancel();

        let result = handle.join().unwrap();
        assert_eq!(result.unwrap_err(), ChainError::MiningCancelled);
    }

    #[test]
    fn test_difficulty_above_hash_width_errors() {
        let result = pow(args(257), &CancelToken::new(), null_sink().as_ref());
        assert!(matches!(result, Err(ChainError::InvalidBlock(_))));
    }
}
