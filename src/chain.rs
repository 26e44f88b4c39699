use alloy_primitives::B256;

use crate::config::ChainConfig;
use crate::errors::EngineResult;
use crate::state::BlockState;
use crate::storage::Storage;
use crate::types::Header;

/// Capability set the engine needs from the chain it verifies against.
/// Realised by the full block-chain, by the header-only chain below, and by
/// the test chain in the integration suite.
pub trait ChainReader: Send + Sync {
    fn config(&self) -> &ChainConfig;
    fn current_header(&self) -> Header;
    fn get_header(&self, hash: &B256, number: u64) -> Option<Header>;
    fn get_header_by_number(&self, number: u64) -> Option<Header>;
    /// State at the given block, when the realisation has state access.
    fn calculate_block_state(&self, hash: &B256, number: u64) -> Option<Box<dyn BlockState>>;
}

/// Header-only chain over the storage layer. It can feed header verification
/// but has no state access, so seal verification is not available through it.
pub struct HeaderChain {
    config: ChainConfig,
    storage: Storage,
}

impl HeaderChain {
    pub fn new(config: ChainConfig, storage: Storage) -> Self {
        Self { config, storage }
    }

    pub fn insert_header(&self, header: &Header) -> EngineResult<()> {
        self.storage.store_header(header)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl ChainReader for HeaderChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn current_header(&self) -> Header {
        self.storage
            .tip()
            .ok()
            .flatten()
            .and_then(|tip| self.storage.read_header(&tip.hash).ok().flatten())
            .unwrap_or_default()
    }

    fn get_header(&self, hash: &B256, _number: u64) -> Option<Header> {
        self.storage.read_header(hash).ok().flatten()
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        self.storage.read_header_by_number(number).ok().flatten()
    }

    fn calculate_block_state(&self, _hash: &B256, _number: u64) -> Option<Box<dyn BlockState>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn header_chain_serves_stored_headers() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        let chain = HeaderChain::new(ChainConfig::default(), storage);

        let header = Header {
            number: 5,
            time: 1_700_000_000,
            ..Header::default()
        };
        chain.insert_header(&header).unwrap();

        assert_eq!(chain.current_header(), header);
        assert_eq!(chain.get_header(&header.hash(), 5), Some(header.clone()));
        assert_eq!(chain.get_header_by_number(5), Some(header.clone()));
        assert!(chain.calculate_block_state(&header.hash(), 5).is_none());
    }
}
