use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::RlpEncodable;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::state::CallMessage;

/// A transaction as seen by the consensus layer. The importer resolves the
/// sender of externally signed transactions before they reach the engine;
/// consensus transactions are synthesised here with an empty signature and an
/// explicit sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub from: Address,
    pub signature: Bytes,
}

#[derive(RlpEncodable)]
struct TransactionEncoding {
    nonce: u64,
    gas_price: U256,
    gas: u64,
    to: Address,
    value: U256,
    input: Bytes,
    from: Address,
    signature: Bytes,
}

impl Transaction {
    pub fn consensus(
        from: Address,
        to: Address,
        value: U256,
        gas: u64,
        input: Vec<u8>,
    ) -> Self {
        Self {
            nonce: 0,
            gas_price: U256::ZERO,
            gas,
            to: Some(to),
            value,
            input: input.into(),
            from,
            signature: Bytes::new(),
        }
    }

    pub fn is_consensus(&self) -> bool {
        self.signature.is_empty()
    }

    pub fn hash(&self) -> B256 {
        let encoding = TransactionEncoding {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas: self.gas,
            to: self.to.unwrap_or_default(),
            value: self.value,
            input: self.input.clone(),
            from: self.from,
            signature: self.signature.clone(),
        };
        keccak256(alloy_rlp::encode(&encoding))
    }

    pub fn as_message(&self) -> CallMessage {
        CallMessage {
            from: self.from,
            to: self.to,
            nonce: self.nonce,
            value: self.value,
            gas: self.gas,
            gas_price: self.gas_price,
            input: self.input.clone(),
        }
    }
}

/// Resolves senders of engine-synthesised transactions only. It must never be
/// used for untrusted transactions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsensusSigner;

impl ConsensusSigner {
    pub fn sender(&self, tx: &Transaction) -> EngineResult<Address> {
        if !tx.is_consensus() {
            return Err(EngineError::InvalidConsensusTx);
        }
        Ok(tx.from)
    }
}
