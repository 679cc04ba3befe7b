//! Cryptographic primitives for bundchain

use crate::blockchain::AccountId;
use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::SECRET_KEY_SIZE,
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub type Sha256Hash = [u8; 32];

/// Hash of the empty pre-genesis head and of an empty Merkle tree.
pub const ZERO_HASH: Sha256Hash = [0u8; 32];

/// Offset added to the recovery id so signatures from this chain are
/// recognisable and cannot be replayed as plain recoverable signatures.
pub const BUND_SIGNATURE_ID: u8 = 29;

const SIGNED_MESSAGE_STAMP: &[u8] = b"\x19Bund Signed Message:\n";

pub fn sha256(bytes: &[u8]) -> Sha256Hash {
    Sha256::digest(bytes).into()
}

/// Hex form used in logs and error messages.
pub fn hash_to_hex(hash: &Sha256Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Digest that is actually signed: the stamp keeps a transaction signature
/// from being valid for any other kind of message.
pub fn signing_digest(message: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(SIGNED_MESSAGE_STAMP);
    hasher.update(message);
    hasher.finalize().into()
}

/// Account ids are the last 20 bytes of SHA-256 over the uncompressed key.
pub fn account_id_from_public_key(public_key: &PublicKey) -> AccountId {
    let uncompressed = public_key.serialize_uncompressed();
    let digest = Sha256::digest(&uncompressed[1..]);
    AccountId::from_bytes(&digest[12..])
}

/// A recoverable signature split the way it travels inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, ChainError> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed)
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// Loads a key file holding the hex encoded secret key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_hex(&contents)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ChainError> {
        std::fs::write(path.as_ref(), self.secret_hex())?;
        Ok(())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn account_id(&self) -> AccountId {
        account_id_from_public_key(&self.public_key)
    }

    /// Signs the stamped digest of `message` with a recoverable signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let digest = Message::from_digest(signing_digest(message));
        let signature = SECP256K1_CONTEXT.sign_ecdsa_recoverable(&digest, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);

        Signature {
            v: recovery_id.to_i32() as u8 + BUND_SIGNATURE_ID,
            r,
            s,
        }
    }
}

/// Recovers the account that produced `signature` over `message`.
pub fn recover_account_id(message: &[u8], signature: &Signature) -> Result<AccountId, ChainError> {
    if signature.v != BUND_SIGNATURE_ID && signature.v != BUND_SIGNATURE_ID + 1 {
        return Err(ChainError::InvalidSignature(format!(
            "invalid recovery id {}",
            signature.v
        )));
    }

    let recovery_id = RecoveryId::from_i32(i32::from(signature.v - BUND_SIGNATURE_ID))
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r);
    compact[32..].copy_from_slice(&signature.s);

    let recoverable = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;

    let digest = Message::from_digest(signing_digest(message));
    let public_key = SECP256K1_CONTEXT
        .recover_ecdsa(&digest, &recoverable)
        .map_err(|e| ChainError::InvalidSignature(e.to_string()))?;

    Ok(account_id_from_public_key(&public_key))
}
