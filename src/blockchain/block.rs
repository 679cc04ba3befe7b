use crate::blockchain::AccountId;
use crate::crypto::{hash_to_hex, Sha256Hash, ZERO_HASH};
use crate::error::ChainError;
use crate::merkle::MerkleTree;
use crate::transaction::BlockTx;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    #[serde(with = "hex::serde")]
    pub prev_block_hash: Sha256Hash,
    pub timestamp: u64,
    pub beneficiary_id: AccountId,
    pub difficulty: u32,
    pub mining_reward: u64,
    #[serde(with = "hex::serde")]
    pub state_root: Sha256Hash,
    #[serde(with = "hex::serde")]
    pub trans_root: Sha256Hash,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.number.to_le_bytes());
        hasher.update(self.prev_block_hash);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.beneficiary_id.as_str().len() as u64).to_le_bytes());
        hasher.update(self.beneficiary_id.as_str().as_bytes());
        hasher.update(self.difficulty.to_le_bytes());
        hasher.update(self.mining_reward.to_le_bytes());
        hasher.update(self.state_root);
        hasher.update(self.trans_root);
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub merkle_tree: MerkleTree<BlockTx>,
}

impl Block {
    /// The head of a chain nothing has been committed to yet.
    pub fn empty() -> Self {
        Block {
            header: BlockHeader::default(),
            merkle_tree: MerkleTree::new(Vec::new()),
        }
    }

    /// Block 0 is never mined, so its hash is fixed to zero.
    pub fn hash(&self) -> Sha256Hash {
        if self.header.number == 0 {
            return ZERO_HASH;
        }
        self.header.hash()
    }

    pub fn hash_str(&self) -> String {
        hash_to_hex(&self.hash())
    }

    pub fn transactions(&self) -> &[BlockTx] {
        self.merkle_tree.values()
    }

    pub fn calculate_merkle_root(transactions: &[BlockTx]) -> Sha256Hash {
        MerkleTree::new(transactions.to_vec()).root()
    }

    /// Highest hash that still has `difficulty` leading zero bits.
    pub fn hash_to_target(difficulty: u32) -> [u8; 32] {
        let mut target = [0xFF; 32];
        let leading_zeros = (difficulty / 8).min(32);
        let partial_bits = difficulty % 8;

        for item in target.iter_mut().take(leading_zeros as usize) {
            *item = 0;
        }

        if leading_zeros < 32 && partial_bits > 0 {
            target[leading_zeros as usize] = 0xFF >> partial_bits;
        }
        target
    }

    pub fn is_hash_solved(difficulty: u32, hash: &Sha256Hash) -> bool {
        *hash <= Block::hash_to_target(difficulty)
    }
}

/// Wire and disk form of a block. Peers exchange exactly what gets stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    #[serde(with = "hex::serde")]
    pub hash: Sha256Hash,
    pub header: BlockHeader,
    pub trans: Vec<BlockTx>,
}

impl From<&Block> for BlockData {
    fn from(block: &Block) -> Self {
        BlockData {
            hash: block.hash(),
            header: block.header.clone(),
            trans: block.transactions().to_vec(),
        }
    }
}

impl TryFrom<BlockData> for Block {
    type Error = ChainError;

    /// Rebuilds the Merkle tree and checks the data agrees with its header.
    fn try_from(data: BlockData) -> Result<Self, Self::Error> {
        let merkle_tree = MerkleTree::new(data.trans);
        if merkle_tree.root() != data.header.trans_root {
            return Err(ChainError::TransRootMismatch {
                expected: hash_to_hex(&data.header.trans_root),
                got: hash_to_hex(&merkle_tree.root()),
            });
        }

        let block = Block {
            header: data.header,
            merkle_tree,
        };

        if block.hash() != data.hash {
            return Err(ChainError::InvalidBlock(format!(
                "block hash {} does not match header hash {}",
                hash_to_hex(&data.hash),
                block.hash_str()
            )));
        }

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_has_leading_zero_bits() {
        assert_eq!(Block::hash_to_target(0), [0xFF; 32]);

        let t = Block::hash_to_target(12);
        assert_eq!(t[0], 0x00);
        assert_eq!(t[1], 0x0F);
        assert_eq!(t[2], 0xFF);
    }

    #[test]
    fn test_is_hash_solved_counts_bits() {
        let mut hash = [0xFF; 32];
        hash[0] = 0b0001_0000;
        assert!(Block::is_hash_solved(3, &hash));
        assert!(!Block::is_hash_solved(4, &hash));

        hash[0] = 0;
        hash[1] = 0b0111_1111;
        assert!(Block::is_hash_solved(9, &hash));
        assert!(!Block::is_hash_solved(10, &hash));
    }

    #[test]
    fn test_empty_block_hash_is_zero() {
        assert_eq!(Block::empty().hash(), ZERO_HASH);
    }

    #[test]
    fn test_header_hash_covers_nonce() {
        let mut header = BlockHeader {
            number: 1,
            ..Default::default()
        };
        let before = header.hash();
        header.nonce += 1;
        assert_ne!(before, header.hash());
    }

    #[test]
    fn test_block_data_with_wrong_trans_root_is_rejected() {
        let data = BlockData {
            hash: ZERO_HASH,
            header: BlockHeader {
                number: 1,
                trans_root: [9u8; 32],
                ..Default::default()
            },
            trans: vec![],
        };
        assert!(matches!(
            Block::try_from(data),
            Err(ChainError::TransRootMismatch { .. })
        ));
    }
}
