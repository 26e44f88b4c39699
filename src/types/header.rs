use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, U256};
use alloy_rlp::RlpEncodable;
use serde::{Deserialize, Serialize};

use crate::params::EMPTY_LIST_HASH;

/// Block header. `mix_digest` carries the PoS modifier and a sealed header
/// carries a 65-byte recoverable signature over `SignatureHash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, RlpEncodable)]
pub struct Header {
    pub parent_hash: B256,
    pub uncle_hash: B256,
    pub coinbase: Address,
    pub root: B256,
    pub tx_hash: B256,
    pub receipt_hash: B256,
    pub bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub time: u64,
    pub extra: Bytes,
    pub mix_digest: B256,
    pub nonce: u64,
    pub signature: Bytes,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            uncle_hash: EMPTY_LIST_HASH,
            coinbase: Address::ZERO,
            root: B256::ZERO,
            tx_hash: EMPTY_LIST_HASH,
            receipt_hash: EMPTY_LIST_HASH,
            bloom: Bloom::ZERO,
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            time: 0,
            extra: Bytes::new(),
            mix_digest: B256::ZERO,
            nonce: 0,
            signature: Bytes::new(),
        }
    }
}

impl Header {
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    /// Block #1 bootstraps the Gen-2 state and follows relaxed static rules.
    pub fn is_migration(&self) -> bool {
        self.number == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_covers_the_signature() {
        let header = Header::default();
        let mut sealed = header.clone();
        sealed.signature = Bytes::from(vec![1u8; 65]);
        assert_ne!(header.hash(), sealed.hash());
    }

    #[test]
    fn hash_is_stable() {
        let header = Header {
            number: 7,
            gas_limit: 8_000_000,
            time: 1_700_000_000,
            ..Header::default()
        };
        assert_eq!(header.hash(), header.clone().hash());
    }

    #[test]
    fn only_block_one_is_the_migration_block() {
        let mut header = Header::default();
        assert!(!header.is_migration());
        header.number = 1;
        assert!(header.is_migration());
        header.number = 2;
        assert!(!header.is_migration());
    }
}
