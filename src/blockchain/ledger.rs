use crate::blockchain::{Account, AccountId, Block};
use crate::crypto::Sha256Hash;
use crate::error::ChainError;
use crate::events::EventSink;
use crate::genesis::Genesis;
use crate::transaction::BlockTx;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

const SOURCE: &str = "ledger";

pub type AccountMap = HashMap<AccountId, Account>;

/// Accounts and chain head read together under one lock.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub latest_block: Block,
    pub accounts: AccountMap,
}

struct LedgerInner {
    latest_block: Block,
    accounts: AccountMap,
}

/// Account balances and nonces plus the latest committed block.
pub struct Ledger {
    genesis: Genesis,
    inner: RwLock<LedgerInner>,
    events: Arc<dyn EventSink>,
}

impl Ledger {
    /// Seeds the accounts from the genesis balances.
    pub fn new(genesis: Genesis, events: Arc<dyn EventSink>) -> Result<Self, ChainError> {
        let accounts = genesis_accounts(&genesis, events.as_ref())?;

        Ok(Ledger {
            genesis,
            inner: RwLock::new(LedgerInner {
                latest_block: Block::empty(),
                accounts,
            }),
            events,
        })
    }

    pub fn query(&self, account_id: &AccountId) -> Result<Account, ChainError> {
        self.inner
            .read()
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| ChainError::NotFound(format!("account {} does not exist", account_id)))
    }

    pub fn remove(&self, account_id: &AccountId) {
        self.inner.write().accounts.remove(account_id);
    }

    pub fn copy(&self) -> AccountMap {
        self.inner.read().accounts.clone()
    }

    /// Deterministic digest of every account; embedded in blocks as the state root.
    pub fn hash_state(&self) -> Sha256Hash {
        let accounts: Vec<Account> = self.inner.read().accounts.values().cloned().collect();
        hash_accounts(accounts)
    }

    pub fn update_latest_block(&self, block: Block) {
        self.inner.write().latest_block = block;
    }

    pub fn latest_block(&self) -> Block {
        self.inner.read().latest_block.clone()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.read();
        LedgerSnapshot {
            latest_block: inner.latest_block.clone(),
            accounts: inner.accounts.clone(),
        }
    }

    /// Installs a validated post-block state and the new head in one step.
    pub fn commit(&self, accounts: AccountMap, block: Block) {
        let mut inner = self.inner.write();
        inner.accounts = accounts;
        inner.latest_block = block;
    }

    /// Back to the genesis balances with nothing committed.
    pub fn reset(&self) -> Result<(), ChainError> {
        let accounts = genesis_accounts(&self.genesis, self.events.as_ref())?;
        let mut inner = self.inner.write();
        inner.accounts = accounts;
        inner.latest_block = Block::empty();
        Ok(())
    }
}

fn genesis_accounts(genesis: &Genesis, events: &dyn EventSink) -> Result<AccountMap, ChainError> {
    let mut accounts = AccountMap::new();
    for (account, balance) in &genesis.balances {
        let account_id = AccountId::parse(account)?;
        events.info(
            SOURCE,
            &format!("genesis account: {}, balance: {}", account_id, balance),
        );
        accounts.insert(account_id.clone(), Account::new(account_id, *balance));
    }
    Ok(accounts)
}

/// Sorts by account id before hashing so map iteration order never matters.
pub fn hash_accounts(mut accounts: Vec<Account>) -> Sha256Hash {
    accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    let mut hasher = Sha256::new();
    for account in &accounts {
        let id = account.account_id.as_str().as_bytes();
        hasher.update((id.len() as u64).to_le_bytes());
        hasher.update(id);
        hasher.update(account.balance.to_le_bytes());
        hasher.update(account.nonce.to_le_bytes());
    }
    hasher.finalize().into()
}

pub fn hash_account_map(accounts: &AccountMap) -> Sha256Hash {
    hash_accounts(accounts.values().cloned().collect())
}

fn account_entry<'a>(accounts: &'a mut AccountMap, id: &AccountId) -> &'a mut Account {
    accounts
        .entry(id.clone())
        .or_insert_with(|| Account::new(id.clone(), 0))
}

/// Applies one transaction for a block sealed by `beneficiary`.
///
/// The gas fee is charged before any other check and stays charged when the
/// transaction then fails, so a failed transaction still changes the state.
pub fn apply_transaction(
    accounts: &mut AccountMap,
    beneficiary: &AccountId,
    tx: &BlockTx,
) -> Result<(), ChainError> {
    let gas_fee = {
        let from = account_entry(accounts, &tx.from_id);
        let fee = tx.gas_fee().min(from.balance);
        from.balance -= fee;
        fee
    };
    let bnfc = account_entry(accounts, beneficiary);
    bnfc.balance = bnfc.balance.saturating_add(gas_fee);

    let from = account_entry(accounts, &tx.from_id);
    if tx.nonce != from.nonce + 1 {
        return Err(ChainError::InvalidTransaction(format!(
            "wrong nonce for {}, got {}, exp {}",
            tx.from_id,
            tx.nonce,
            from.nonce + 1
        )));
    }

    let needed = tx.value.checked_add(tx.tip).ok_or_else(|| {
        ChainError::InvalidTransaction("value plus tip overflows".to_string())
    })?;
    if from.balance == 0 || from.balance < needed {
        return Err(ChainError::InvalidTransaction(format!(
            "insufficient funds for {}, bal {}, needed {}",
            tx.from_id, from.balance, needed
        )));
    }

    from.balance -= needed;
    from.nonce = tx.nonce;

    let to = account_entry(accounts, &tx.to_id);
    to.balance = to.balance.saturating_add(tx.value);

    let bnfc = account_entry(accounts, beneficiary);
    bnfc.balance = bnfc.balance.saturating_add(tx.tip);

    Ok(())
}

pub fn apply_mining_reward(accounts: &mut AccountMap, beneficiary: &AccountId, reward: u64) {
    let bnfc = account_entry(accounts, beneficiary);
    bnfc.balance = bnfc.balance.saturating_add(reward);
}

/// Applies every transaction of a block and then the mining reward. Failed
/// transactions are reported and skipped; they never invalidate the block.
pub fn apply_block_effects(
    accounts: &mut AccountMap,
    beneficiary: &AccountId,
    mining_reward: u64,
    transactions: &[BlockTx],
    events: &dyn EventSink,
) {
    for tx in transactions {
        if let Err(e) = apply_transaction(accounts, beneficiary, tx) {
            events.warn(SOURCE, &format!("transaction {} failed: {}", tx.key(), e));
        }
    }
    apply_mining_reward(accounts, beneficiary, mining_reward);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::events::null_sink;
    use crate::transaction::UserTx;
    use std::collections::BTreeMap;

    fn genesis(balances: &[(&AccountId, u64)]) -> Genesis {
        Genesis {
            date: "2024-01-01".to_string(),
            chain_id: 1,
            trans_per_block: 10,
            difficulty: 1,
            mining_reward: 700,
            gas_price: 0,
            balances: balances
                .iter()
                .map(|(id, bal)| (id.to_string(), *bal))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn tx(from: &KeyPair, to: &AccountId, nonce: u64, value: u64, tip: u64, gas: u64) -> BlockTx {
        let signed = UserTx::new(1, nonce, from.account_id(), to.clone(), value, tip, vec![])
            .sign(from);
        BlockTx::new(signed, gas, 1)
    }

    #[test]
    fn test_seeds_from_genesis() {
        let a = KeyPair::generate().account_id();
        let ledger = Ledger::new(genesis(&[(&a, 1000)]), null_sink()).unwrap();
        assert_eq!(ledger.query(&a).unwrap().balance, 1000);
        assert_eq!(ledger.latest_block().header.number, 0);
    }

    #[test]
    fn test_malformed_genesis_account_fails() {
        let mut g = genesis(&[]);
        g.balances.insert("kenneth".to_string(), 10);
        assert!(matches!(
            Ledger::new(g, null_sink()),
            Err(ChainError::InvalidAccountId(_))
        ));
    }

    #[test]
    fn test_query_missing_and_remove() {
        let a = KeyPair::generate().account_id();
        let ledger = Ledger::new(genesis(&[(&a, 5)]), null_sink()).unwrap();
        ledger.remove(&a);
        assert!(matches!(ledger.query(&a), Err(ChainError::NotFound(_))));
    }

    #[test]
    fn test_hash_state_ignores_insertion_order() {
        let ids: Vec<AccountId> = (0..5).map(|_| KeyPair::generate().account_id()).collect();
        let accounts: Vec<Account> = ids.iter().map(|id| Account::new(id.clone(), 10)).collect();
        let mut reversed = accounts.clone();
        reversed.reverse();
        assert_eq!(hash_accounts(accounts), hash_accounts(reversed));
    }

    #[test]
    fn test_hash_state_tracks_balance_and_nonce() {
        let a = KeyPair::generate().account_id();
        let mut accounts = AccountMap::new();
        accounts.insert(a.clone(), Account::new(a.clone(), 10));
        let base = hash_account_map(&accounts);

        accounts.get_mut(&a).unwrap().balance = 11;
        let bumped_balance = hash_account_map(&accounts);
        assert_ne!(base, bumped_balance);

        accounts.get_mut(&a).unwrap().balance = 10;
        assert_eq!(base, hash_account_map(&accounts));

        accounts.get_mut(&a).unwrap().nonce = 1;
        assert_ne!(base, hash_account_map(&accounts));
    }

    #[test]
    fn test_apply_transaction_moves_value_tip_and_gas() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();
        let miner = KeyPair::generate().account_id();

        let mut accounts = AccountMap::new();
        accounts.insert(alice.account_id(), Account::new(alice.account_id(), 1000));

        apply_transaction(&mut accounts, &miner, &tx(&alice, &bob, 1, 100, 1, 15)).unwrap();

        assert_eq!(accounts[&alice.account_id()].balance, 1000 - 15 - 100 - 1);
        assert_eq!(accounts[&alice.account_id()].nonce, 1);
        assert_eq!(accounts[&bob].balance, 100);
        assert_eq!(accounts[&miner].balance, 16);
    }

    #[test]
    fn test_wrong_nonce_still_pays_gas() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();
        let miner = KeyPair::generate().account_id();

        let mut accounts = AccountMap::new();
        accounts.insert(alice.account_id(), Account::new(alice.account_id(), 1000));

        let result = apply_transaction(&mut accounts, &miner, &tx(&alice, &bob, 2, 100, 0, 15));
        assert!(matches!(result, Err(ChainError::InvalidTransaction(_))));
        assert_eq!(accounts[&alice.account_id()].balance, 985);
        assert_eq!(accounts[&alice.account_id()].nonce, 0);
        assert_eq!(accounts[&miner].balance, 15);
        assert!(!accounts.contains_key(&bob));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();
        let miner = KeyPair::generate().account_id();

        let mut accounts = AccountMap::new();
        accounts.insert(alice.account_id(), Account::new(alice.account_id(), 50));

        let result = apply_transaction(&mut accounts, &miner, &tx(&alice, &bob, 1, 100, 0, 0));
        assert!(result.is_err());
        assert_eq!(accounts[&alice.account_id()].balance, 50);
    }

    #[test]
    fn test_block_effects_credit_reward() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate().account_id();
        let miner = KeyPair::generate().account_id();

        let mut accounts = AccountMap::new();
        accounts.insert(alice.account_id(), Account::new(alice.account_id(), 1000));

        let txs = vec![
            tx(&alice, &bob, 1, 100, 2, 0),
            tx(&alice, &bob, 5, 100, 2, 0), // wrong nonce, skipped
        ];
        apply_block_effects(&mut accounts, &miner, 700, &txs, null_sink().as_ref());

        assert_eq!(accounts[&bob].balance, 100);
        assert_eq!(accounts[&miner].balance, 702);
    }

    #[test]
    fn test_commit_and_reset() {
        let a = KeyPair::generate().account_id();
        let ledger = Ledger::new(genesis(&[(&a, 1000)]), null_sink()).unwrap();

        let mut snapshot = ledger.snapshot();
        snapshot.accounts.get_mut(&a).unwrap().balance = 1;
        let mut head = Block::empty();
        head.header.number = 1;
        ledger.commit(snapshot.accounts, head);

        assert_eq!(ledger.query(&a).unwrap().balance, 1);
        assert_eq!(ledger.latest_block().header.number, 1);

        ledger.reset().unwrap();
        assert_eq!(ledger.query(&a).unwrap().balance, 1000);
        assert_eq!(ledger.latest_block().header.number, 0);
    }
}
