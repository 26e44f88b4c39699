use alloy_primitives::{keccak256, Bloom, B256};
use serde::{Deserialize, Serialize};

use crate::params::EMPTY_LIST_HASH;

use super::{Header, Receipt, Transaction};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    uncles: Vec<Header>,
}

impl Block {
    /// Assembles a block, deriving the transaction root, receipt root and
    /// bloom into the header copy it keeps.
    pub fn new(
        mut header: Header,
        transactions: Vec<Transaction>,
        uncles: Vec<Header>,
        receipts: &[Receipt],
    ) -> Self {
        header.tx_hash = derive_list_hash(transactions.iter().map(Transaction::hash));
        header.receipt_hash = derive_list_hash(receipts.iter().map(Receipt::summary_hash));
        header.uncle_hash = if uncles.is_empty() {
            EMPTY_LIST_HASH
        } else {
            derive_list_hash(uncles.iter().map(Header::hash))
        };
        let mut bloom = Bloom::ZERO;
        for receipt in receipts {
            bloom.accrue_bloom(&receipt.bloom);
        }
        header.bloom = bloom;
        Self {
            header,
            transactions,
            uncles,
        }
    }

    /// Replaces the header, keeping the body. Used to attach the seal.
    pub fn with_seal(self, header: Header) -> Self {
        Self {
            header,
            transactions: self.transactions,
            uncles: self.uncles,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn uncles(&self) -> &[Header] {
        &self.uncles
    }

    pub fn hash(&self) -> B256 {
        self.header.hash()
    }
}

pub fn derive_list_hash(hashes: impl Iterator<Item = B256>) -> B256 {
    let hashes: Vec<B256> = hashes.collect();
    keccak256(alloy_rlp::encode(&hashes))
}
