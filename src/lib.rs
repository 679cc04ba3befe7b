//! bundchain - a minimal proof-of-work account blockchain node
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Blockchain
//! - [`blockchain`] - Accounts, blocks, the ledger, proof of work and block validation
//! - [`transaction`] - Transaction types and admission checks
//! - [`mempool`] - Pending transactions and selection strategies
//! - [`merkle`] - Merkle tree over block transactions
//! - [`genesis`] - Chain parameters and opening balances
//!
//! ## Cryptography
//! - [`crypto`] - Keys, recoverable signatures and account ids (secp256k1)
//!
//! ## Node
//! - [`state`] - The node API every other component goes through
//! - [`worker`] - Mining, peer update and transaction sharing loops
//! - [`persistence`] - Block storage (SQLite)
//!
//! ## Networking
//! - [`peer`] - Known peers
//! - [`network`] - Calls to other nodes
//! - [`api`] - Public and private HTTP routers
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`events`] - Leveled event sink

#![forbid(unsafe_code)]

// ============================================================================
// Core Blockchain
// ============================================================================
pub mod blockchain;
pub mod genesis;
pub mod mempool;
pub mod merkle;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node
// ============================================================================
pub mod persistence;
pub mod state;
pub mod worker;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod peer;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "api")]
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod events;
