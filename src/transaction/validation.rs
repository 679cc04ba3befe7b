/// Validation logic for transactions separated from type definitions
use crate::crypto::recover_account_id;
use crate::error::ChainError;
use crate::transaction::types::{BlockTx, SignedTx, MAX_TRANSACTION_SIZE};

impl SignedTx {
    /// Full admission check: chain id, account formats, signature and size.
    /// Balance and nonce are only checked when the transaction is mined.
    pub fn validate(&self, chain_id: u16) -> Result<(), ChainError> {
        if self.chain_id != chain_id {
            return Err(ChainError::ChainIdMismatch {
                expected: chain_id,
                got: self.chain_id,
            });
        }
        self.validate_format()?;
        self.verify_signature()
    }

    /// Checks both account ids and the encoded size.
    pub fn validate_format(&self) -> Result<(), ChainError> {
        if !self.from_id.is_valid() {
            return Err(ChainError::InvalidAccountId(format!(
                "from account {} is not properly formatted",
                self.from_id
            )));
        }

        if !self.to_id.is_valid() {
            return Err(ChainError::InvalidRecipient(format!(
                "to account {} is not properly formatted",
                self.to_id
            )));
        }

        self.validate_size()
    }

    /// The signature must recover to the claimed sender.
    pub fn verify_signature(&self) -> Result<(), ChainError> {
        let recovered = recover_account_id(&self.tx.signable_message(), &self.signature())?;
        if recovered != self.from_id {
            return Err(ChainError::InvalidSignature(format!(
                "signature recovers to {}, not {}",
                recovered, self.from_id
            )));
        }
        Ok(())
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = serde_json::to_vec(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}

impl BlockTx {
    pub fn validate(&self, chain_id: u16) -> Result<(), ChainError> {
        self.signed.validate(chain_id)
    }
}
