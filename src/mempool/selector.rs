//! Transaction selection strategies
//!
//! A strategy picks which pending transactions go into the next block. Every
//! strategy keeps each account's transactions in nonce order, since a block
//! that skips a nonce only burns gas.

use crate::blockchain::AccountId;
use crate::error::ChainError;
use crate::transaction::{BlockTx, TxKey};
use std::collections::{BTreeMap, VecDeque};

pub const STRATEGY_TIP: &str = "tip";
pub const STRATEGY_FIFO: &str = "fifo";

/// Picks at most `how_many` transactions from the pool.
pub type SelectFn = fn(&BTreeMap<TxKey, BlockTx>, usize) -> Vec<BlockTx>;

const STRATEGIES: &[(&str, SelectFn)] = &[(STRATEGY_TIP, tip_select), (STRATEGY_FIFO, fifo_select)];

/// Looks up a strategy by its configured name.
pub fn retrieve(strategy: &str) -> Result<SelectFn, ChainError> {
    STRATEGIES
        .iter()
        .find(|(name, _)| *name == strategy.to_lowercase())
        .map(|(_, select)| *select)
        .ok_or_else(|| ChainError::UnknownStrategy(strategy.to_string()))
}

pub fn names() -> Vec<&'static str> {
    STRATEGIES.iter().map(|(name, _)| *name).collect()
}

/// Pending transactions grouped by sender, each queue in nonce order. The
/// pool is keyed by (account, nonce) so iteration already yields that order.
fn by_account(pool: &BTreeMap<TxKey, BlockTx>) -> BTreeMap<AccountId, VecDeque<BlockTx>> {
    let mut accounts: BTreeMap<AccountId, VecDeque<BlockTx>> = BTreeMap::new();
    for (key, tx) in pool {
        accounts
            .entry(key.from_id.clone())
            .or_default()
            .push_back(tx.clone());
    }
    accounts
}

/// Highest tip first without breaking nonce order.
///
/// Row `i` holds the `i`th pending transaction of every account. Rows are
/// taken whole while they fit; the first row that does not fit is sorted by
/// tip and fills the remaining space.
pub fn tip_select(pool: &BTreeMap<TxKey, BlockTx>, how_many: usize) -> Vec<BlockTx> {
    let mut accounts = by_account(pool);

    let mut rows: Vec<Vec<BlockTx>> = Vec::new();
    loop {
        let row: Vec<BlockTx> = accounts
            .values_mut()
            .filter_map(|queue| queue.pop_front())
            .collect();
        if row.is_empty() {
            break;
        }
        rows.push(row);
    }

    let mut selected = Vec::with_capacity(how_many.min(pool.len()));
    for mut row in rows {
        row.sort_by(|a, b| b.tip.cmp(&a.tip).then_with(|| a.from_id.cmp(&b.from_id)));

        let room = how_many - selected.len();
        if row.len() <= room {
            selected.extend(row);
            continue;
        }

        selected.extend(row.into_iter().take(room));
        break;
    }
    selected
}

/// Oldest transaction first, where an account only offers its lowest
/// pending nonce at any time.
pub fn fifo_select(pool: &BTreeMap<TxKey, BlockTx>, how_many: usize) -> Vec<BlockTx> {
    let mut accounts = by_account(pool);
    let mut selected = Vec::with_capacity(how_many.min(pool.len()));

    while selected.len() < how_many {
        let next = accounts
            .iter()
            .filter_map(|(id, queue)| queue.front().map(|tx| (tx.timestamp, id)))
            .min()
            .map(|(_, id)| id.clone());

        let Some(id) = next else {
            break;
        };
        if let Some(tx) = accounts.get_mut(&id).and_then(|queue| queue.pop_front()) {
            selected.push(tx);
        }
    }
    selected
}
