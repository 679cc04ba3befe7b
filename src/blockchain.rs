// Thin re-export module: accounts, blocks, the ledger, the proof-of-work
// search and block validation each live in their own submodule.

pub mod account;
pub mod block;
pub mod ledger;
pub mod pow;
pub mod validation;

pub use account::*;
pub use block::*;
pub use ledger::*;
pub use pow::*;
pub use validation::*;
