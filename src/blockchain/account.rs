use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bytes behind an account id.
pub const ACCOUNT_ID_BYTES: usize = 20;

/// `0x` followed by 40 lowercase hex digits.
///
/// Deserialization keeps the raw string so that a malformed id inside a
/// submitted transaction surfaces as a validation error, not a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Parses and canonicalizes an account id.
    pub fn parse(s: &str) -> Result<Self, ChainError> {
        let digits = s.strip_prefix("0x").ok_or_else(|| {
            ChainError::InvalidAccountId(format!("{} is missing the 0x prefix", s))
        })?;

        if digits.len() != ACCOUNT_ID_BYTES * 2 {
            return Err(ChainError::InvalidAccountId(format!(
                "{} must hold {} hex digits, got {}",
                s,
                ACCOUNT_ID_BYTES * 2,
                digits.len()
            )));
        }

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChainError::InvalidAccountId(format!("{} is not hex", s)));
        }

        Ok(AccountId(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        AccountId(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Re-checks the format of an id that arrived without going through `parse`.
    pub fn is_valid(&self) -> bool {
        AccountId::parse(&self.0).map(|id| id == *self).unwrap_or(false)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountId::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub balance: u64,
    pub nonce: u64,
}

impl Account {
    pub fn new(account_id: AccountId, balance: u64) -> Self {
        Account {
            account_id,
            balance,
            nonce: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes_case() {
        let upper = "0xF01813E4B85E178A83E29B8E7BF26BD830A25F32";
        let id = AccountId::parse(upper).unwrap();
        assert_eq!(id.as_str(), "0xf01813e4b85e178a83e29b8e7bf26bd830a25f32");
        assert_eq!(id, AccountId::parse(&upper.to_lowercase()).unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(AccountId::parse("f01813e4b85e178a83e29b8e7bf26bd830a25f32").is_err());
        assert!(AccountId::parse("0x1234").is_err());
        assert!(AccountId::parse("0xz01813e4b85e178a83e29b8e7bf26bd830a25f32").is_err());
    }

    #[test]
    fn test_decoded_id_is_checked_lazily() {
        let good: AccountId =
            serde_json::from_str("\"0xf01813e4b85e178a83e29b8e7bf26bd830a25f32\"").unwrap();
        assert!(good.is_valid());

        let bad: AccountId = serde_json::from_str("\"bob\"").unwrap();
        assert!(!bad.is_valid());

        let upper: AccountId =
            serde_json::from_str("\"0xF01813E4B85E178A83E29B8E7BF26BD830A25F32\"").unwrap();
        assert!(!upper.is_valid());
    }
}
