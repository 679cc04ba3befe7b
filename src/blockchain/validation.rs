use crate::blockchain::{apply_block_effects, hash_account_map, AccountMap, Block, LedgerSnapshot};
use crate::crypto::hash_to_hex;
use crate::error::ChainError;
use crate::events::EventSink;
use std::collections::HashSet;

/// Checks a proposed block against the current head and accounts.
///
/// Returns the post-block account set so the caller can commit exactly the
/// state that was verified. Nothing in `snapshot` is modified.
pub fn validate_block(
    block: &Block,
    snapshot: &LedgerSnapshot,
    min_difficulty: u32,
    events: &dyn EventSink,
) -> Result<AccountMap, ChainError> {
    let latest = &snapshot.latest_block;

    if block.header.difficulty < min_difficulty {
        return Err(ChainError::InvalidBlock(format!(
            "block difficulty {} is less than the chain difficulty {}",
            block.header.difficulty, min_difficulty
        )));
    }

    let hash = block.hash();
    if block.header.number == 0 || !Block::is_hash_solved(block.header.difficulty, &hash) {
        return Err(ChainError::InvalidProof(format!(
            "{} does not have {} leading zero bits",
            hash_to_hex(&hash),
            block.header.difficulty
        )));
    }

    let next_number = latest.header.number + 1;
    if block.header.number != next_number {
        return Err(ChainError::OutOfSync(format!(
            "this block is not the next number, got {}, exp {}",
            block.header.number, next_number
        )));
    }

    if block.header.prev_block_hash != latest.hash() {
        return Err(ChainError::OutOfSync(format!(
            "parent block hash doesn't match our known parent, got {}, exp {}",
            hash_to_hex(&block.header.prev_block_hash),
            latest.hash_str()
        )));
    }

    if latest.header.timestamp > 0 && block.header.timestamp < latest.header.timestamp {
        return Err(ChainError::InvalidBlock(format!(
            "block timestamp {} is before parent block timestamp {}",
            block.header.timestamp, latest.header.timestamp
        )));
    }

    let trans_root = Block::calculate_merkle_root(block.transactions());
    if trans_root != block.header.trans_root {
        return Err(ChainError::TransRootMismatch {
            expected: hash_to_hex(&block.header.trans_root),
            got: hash_to_hex(&trans_root),
        });
    }

    // An odd Merkle level pairs its last node with itself, so a repeated
    // trailing transaction leaves the root unchanged.
    let mut seen = HashSet::with_capacity(block.transactions().len());
    for tx in block.transactions() {
        if !seen.insert(tx.key()) {
            return Err(ChainError::InvalidBlock(format!(
                "transaction {} appears more than once",
                tx.key()
            )));
        }
    }

    let mut accounts = snapshot.accounts.clone();
    apply_block_effects(
        &mut accounts,
        &block.header.beneficiary_id,
        block.header.mining_reward,
        block.transactions(),
        events,
    );

    let state_root = hash_account_map(&accounts);
    if state_root != block.header.state_root {
        return Err(ChainError::StateRootMismatch {
            expected: hash_to_hex(&block.header.state_root),
            got: hash_to_hex(&state_root),
        });
    }

    Ok(accounts)
}
