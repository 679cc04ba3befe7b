/// Transaction types for bundchain
use crate::blockchain::AccountId;
use crate::crypto::{sha256, KeyPair, Sha256Hash, Signature};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Every wallet transaction is charged a single unit of gas.
pub const ONE_UNIT_OF_GAS: u64 = 1;

/// The unsigned intent of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTx {
    pub chain_id: u16,
    pub nonce: u64,
    pub from_id: AccountId,
    pub to_id: AccountId,
    pub value: u64,
    pub tip: u64,
    #[serde(default, with = "hex::serde")]
    pub data: Vec<u8>,
}

impl UserTx {
    pub fn new(
        chain_id: u16,
        nonce: u64,
        from_id: AccountId,
        to_id: AccountId,
        value: u64,
        tip: u64,
        data: Vec<u8>,
    ) -> Self {
        UserTx {
            chain_id,
            nonce,
            from_id,
            to_id,
            value,
            tip,
            data,
        }
    }

    /// Deterministic byte encoding covered by the signature. Variable length
    /// fields are length prefixed so no two transactions share an encoding.
    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(128 + self.data.len());
        message.extend_from_slice(&self.chain_id.to_le_bytes());
        message.extend_from_slice(&self.nonce.to_le_bytes());
        push_prefixed(&mut message, self.from_id.as_str().as_bytes());
        push_prefixed(&mut message, self.to_id.as_str().as_bytes());
        message.extend_from_slice(&self.value.to_le_bytes());
        message.extend_from_slice(&self.tip.to_le_bytes());
        push_prefixed(&mut message, &self.data);
        message
    }

    pub fn sign(self, keypair: &KeyPair) -> SignedTx {
        let signature = keypair.sign(&self.signable_message());
        SignedTx {
            tx: self,
            v: signature.v,
            r: signature.r,
            s: signature.s,
        }
    }
}

fn push_prefixed(message: &mut Vec<u8>, bytes: &[u8]) {
    message.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    message.extend_from_slice(bytes);
}

/// A user transaction together with its recoverable signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    #[serde(flatten)]
    pub tx: UserTx,
    pub v: u8,
    #[serde(with = "hex::serde")]
    pub r: [u8; 32],
    #[serde(with = "hex::serde")]
    pub s: [u8; 32],
}

impl SignedTx {
    pub fn signature(&self) -> Signature {
        Signature {
            v: self.v,
            r: self.r,
            s: self.s,
        }
    }

    /// Compact `0x<r><s><v>` form shown to API users.
    pub fn signature_string(&self) -> String {
        format!("0x{}{}{:02x}", hex::encode(self.r), hex::encode(self.s), self.v)
    }
}

impl Deref for SignedTx {
    type Target = UserTx;

    fn deref(&self) -> &UserTx {
        &self.tx
    }
}

/// The form a transaction takes inside the mempool and inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTx {
    #[serde(flatten)]
    pub signed: SignedTx,
    pub timestamp: u64,
    pub gas_price: u64,
    pub gas_units: u64,
}

impl BlockTx {
    pub fn new(signed: SignedTx, gas_price: u64, gas_units: u64) -> Self {
        BlockTx {
            signed,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            gas_price,
            gas_units,
        }
    }

    pub fn gas_fee(&self) -> u64 {
        self.gas_price.saturating_mul(self.gas_units)
    }

    /// Merkle leaf hash.
    pub fn hash(&self) -> Sha256Hash {
        let mut bytes = self.signed.tx.signable_message();
        bytes.push(self.signed.v);
        bytes.extend_from_slice(&self.signed.r);
        bytes.extend_from_slice(&self.signed.s);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.gas_price.to_le_bytes());
        bytes.extend_from_slice(&self.gas_units.to_le_bytes());
        sha256(&bytes)
    }

    /// Mempool key: at most one pending transaction per account and nonce.
    pub fn key(&self) -> TxKey {
        TxKey {
            from_id: self.signed.tx.from_id.clone(),
            nonce: self.signed.tx.nonce,
        }
    }
}

impl Deref for BlockTx {
    type Target = SignedTx;

    fn deref(&self) -> &SignedTx {
        &self.signed
    }
}

impl crate::merkle::Hashable for BlockTx {
    fn hash(&self) -> Sha256Hash {
        BlockTx::hash(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxKey {
    pub from_id: AccountId,
    pub nonce: u64,
}

impl std::fmt::Display for TxKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.from_id, self.nonce)
    }
}
