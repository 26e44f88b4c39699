use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256};
use alloy_rlp::RlpEncodable;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub status: u64,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub bloom: Bloom,
    pub logs: Vec<Log>,
}

#[derive(RlpEncodable)]
struct ReceiptEncoding {
    tx_hash: B256,
    status: u64,
    cumulative_gas_used: u64,
}

impl Receipt {
    pub fn succeeded(tx_hash: B256, cumulative_gas_used: u64, gas_used: u64) -> Self {
        Self {
            tx_hash,
            status: 1,
            cumulative_gas_used,
            gas_used,
            bloom: Bloom::ZERO,
            logs: Vec::new(),
        }
    }

    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        let mut bloom = Bloom::ZERO;
        for log in &logs {
            accrue_log(&mut bloom, log);
        }
        self.bloom = bloom;
        self.logs = logs;
        self
    }

    pub fn summary_hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(&ReceiptEncoding {
            tx_hash: self.tx_hash,
            status: self.status,
            cumulative_gas_used: self.cumulative_gas_used,
        }))
    }
}

pub fn accrue_log(bloom: &mut Bloom, log: &Log) {
    bloom.accrue(alloy_primitives::BloomInput::Raw(log.address.as_slice()));
    for topic in &log.topics {
        bloom.accrue(alloy_primitives::BloomInput::Raw(topic.as_slice()));
    }
}
