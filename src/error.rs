//! Error types for bundchain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    // Validation: rejected at mempool entry
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Invalid account id: {0}")]
    InvalidAccountId(String),
    #[error("Chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: u16, got: u16 },
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    // Consensus: rejected at block validation
    #[error("Invalid proof of work: {0}")]
    InvalidProof(String),
    #[error("Block out of sync: {0}")]
    OutOfSync(String),
    #[error("Merkle root mismatch: expected {expected}, got {got}")]
    TransRootMismatch { expected: String, got: String },
    #[error("State root mismatch: expected {expected}, got {got}")]
    StateRootMismatch { expected: String, got: String },
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    // Operational
    #[error("No transactions in mempool")]
    NoTransactions,
    #[error("Mining cancelled")]
    MiningCancelled,

    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Unknown selection strategy: {0}")]
    UnknownStrategy(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
}

impl ChainError {
    /// Consensus failures mean the proposing peer's block is discarded.
    pub fn is_consensus(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidProof(_)
                | ChainError::OutOfSync(_)
                | ChainError::TransRootMismatch { .. }
                | ChainError::StateRootMismatch { .. }
                | ChainError::InvalidBlock(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<rusqlite::Error> for ChainError {
    fn from(err: rusqlite::Error) -> Self {
        ChainError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_errors() {
        assert!(ChainError::OutOfSync("behind".to_string()).is_consensus());
        assert!(ChainError::StateRootMismatch {
            expected: "0x01".to_string(),
            got: "0x02".to_string(),
        }
        .is_consensus());
        assert!(!ChainError::DatabaseError("Database is closed".to_string()).is_consensus());
        assert!(!ChainError::MiningCancelled.is_consensus());
    }
}
