//! Pending transactions waiting to be mined

pub mod selector;

use crate::error::ChainError;
use crate::transaction::{BlockTx, TxKey};
use parking_lot::RwLock;
use selector::SelectFn;
use std::collections::BTreeMap;

/// Holds at most one transaction per (account, nonce); a newer submission for
/// the same key replaces the older one.
pub struct Mempool {
    pool: RwLock<BTreeMap<TxKey, BlockTx>>,
    strategy: &'static str,
    select: SelectFn,
}

impl Mempool {
    /// A mempool using the tip strategy.
    pub fn new() -> Self {
        Mempool {
            pool: RwLock::new(BTreeMap::new()),
            strategy: selector::STRATEGY_TIP,
            select: selector::tip_select,
        }
    }

    pub fn with_strategy(strategy: &str) -> Result<Self, ChainError> {
        let select = selector::retrieve(strategy)?;
        let strategy = selector::names()
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(strategy))
            .unwrap_or(selector::STRATEGY_TIP);

        Ok(Mempool {
            pool: RwLock::new(BTreeMap::new()),
            strategy,
            select,
        })
    }

    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn count(&self) -> usize {
        self.pool.read().len()
    }

    /// Admits a transaction after checking its format and signature.
    pub fn upsert(&self, tx: BlockTx) -> Result<(), ChainError> {
        tx.signed.validate_format()?;
        tx.signed.verify_signature()?;

        self.pool.write().insert(tx.key(), tx);
        Ok(())
    }

    /// Returns copies of up to `how_many` transactions; zero means all of them.
    pub fn pick_best(&self, how_many: usize) -> Vec<BlockTx> {
        let pool = self.pool.read();
        let how_many = if how_many == 0 { pool.len() } else { how_many };
        (self.select)(&pool, how_many)
    }

    pub fn delete<'a>(&self, keys: impl IntoIterator<Item = &'a TxKey>) {
        let mut pool = self.pool.write();
        for key in keys {
            pool.remove(key);
        }
    }

    pub fn truncate(&self) {
        self.pool.write().clear();
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::AccountId;
    use crate::crypto::KeyPair;
    use crate::transaction::UserTx;

    fn tx(from: &KeyPair, to: &AccountId, nonce: u64, tip: u64) -> BlockTx {
        let signed = UserTx::new(1, nonce, from.account_id(), to.clone(), 10, tip, vec![])
            .sign(from);
        BlockTx::new(signed, 15, 1)
    }

    #[test]
    fn test_upsert_replaces_same_key() {
        let mempool = Mempool::new();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();

        mempool.upsert(tx(&alice, &bob, 1, 1)).unwrap();
        mempool.upsert(tx(&alice, &bob, 2, 1)).unwrap();
        assert_eq!(mempool.count(), 2);

        mempool.upsert(tx(&alice, &bob, 1, 50)).unwrap();
        assert_eq!(mempool.count(), 2);

        let first = &mempool.pick_best(1)[0];
        assert_eq!(first.nonce, 1);
        assert_eq!(first.tip, 50);
    }

    #[test]
    fn test_upsert_rejects_forged_signature() {
        let mempool = Mempool::new();
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        let bob = KeyPair::generate().account_id();

        // Mallory signs a transfer out of Alice's account.
        let signed = UserTx::new(1, 1, alice.account_id(), bob, 10, 0, vec![]).sign(&mallory);
        let result = mempool.upsert(BlockTx::new(signed, 0, 1));
        assert!(matches!(result, Err(ChainError::InvalidSignature(_))));
        assert_eq!(mempool.count(), 0);
    }

    #[test]
    fn test_upsert_rejects_malformed_recipient() {
        let mempool = Mempool::new();
        let alice = KeyPair::generate();
        let bad: AccountId = serde_json::from_str("\"0xnothex\"").unwrap();

        let result = mempool.upsert(tx(&alice, &bad, 1, 0));
        assert!(matches!(result, Err(ChainError::InvalidRecipient(_))));
    }

    #[test]
    fn test_upsert_rejects_oversized_data() {
        let mempool = Mempool::new();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();

        let signed = UserTx::new(1, 1, alice.account_id(), bob, 10, 0, vec![0u8; 60_000])
            .sign(&alice);
        let result = mempool.upsert(BlockTx::new(signed, 0, 1));
        assert!(matches!(result, Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_pick_best_zero_means_all_and_does_not_mutate() {
        let mempool = Mempool::new();
        let bob = KeyPair::generate().account_id();
        for _ in 0..5 {
            mempool.upsert(tx(&KeyPair::generate(), &bob, 1, 1)).unwrap();
        }

        assert_eq!(mempool.pick_best(0).len(), 5);
        assert_eq!(mempool.pick_best(2).len(), 2);
        assert_eq!(mempool.pick_best(100).len(), 5);
        assert_eq!(mempool.count(), 5);
    }

    #[test]
    fn test_delete_and_truncate() {
        let mempool = Mempool::new();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();

        let first = tx(&alice, &bob, 1, 0);
        let second = tx(&alice, &bob, 2, 0);
        mempool.upsert(first.clone()).unwrap();
        mempool.upsert(second).unwrap();

        mempool.delete([&first.key()]);
        assert_eq!(mempool.count(), 1);
        assert_eq!(mempool.pick_best(0)[0].nonce, 2);

        mempool.truncate();
        assert_eq!(mempool.count(), 0);
    }

    #[test]
    fn test_with_strategy() {
        assert_eq!(Mempool::with_strategy("FIFO").unwrap().strategy(), "fifo");
        assert!(matches!(
            Mempool::with_strategy("lottery"),
            Err(ChainError::UnknownStrategy(_))
        ));
    }
}
