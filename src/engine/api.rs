use std::sync::Arc;

use alloy_primitives::Address;
use serde::Serialize;

use crate::chain::ChainReader;

use super::Engine;

/// A namespace this engine contributes to the node's RPC router.
pub struct RpcApi {
    pub namespace: &'static str,
    pub version: &'static str,
    pub public: bool,
    pub service: EngineApi,
}

/// Backing handle of the `miner` namespace: lets RPC clients adjust the
/// nonce ceiling and read the mining status.
#[derive(Clone)]
pub struct EngineApi {
    chain: Arc<dyn ChainReader>,
    engine: Engine,
}

#[derive(Clone, Debug, Serialize)]
pub struct MiningStatus {
    pub mining: bool,
    pub peer_count: usize,
    pub accounts: Vec<Address>,
    pub nonce_cap: u64,
    pub head_number: u64,
}

impl EngineApi {
    pub fn new(chain: Arc<dyn ChainReader>, engine: Engine) -> Self {
        Self { chain, engine }
    }

    pub fn set_miner_nonce_cap(&self, nonce_cap: u64) {
        self.engine.set_miner_nonce_cap(nonce_cap);
    }

    pub fn miner_nonce_cap(&self) -> u64 {
        self.engine.get_miner_nonce_cap()
    }

    pub fn mining_status(&self) -> MiningStatus {
        let (mining, peer_count, accounts) = match self.engine.callbacks() {
            Some(callbacks) => (
                (callbacks.is_mining)(),
                (callbacks.peer_count)(),
                (callbacks.accounts)(),
            ),
            None => (false, 0, Vec::new()),
        };
        MiningStatus {
            mining,
            peer_count,
            accounts,
            nonce_cap: self.engine.get_miner_nonce_cap(),
            head_number: self.chain.current_header().number,
        }
    }
}

impl Engine {
    /// The RPC namespaces this engine provides.
    pub fn apis(&self, chain: Arc<dyn ChainReader>) -> Vec<RpcApi> {
        vec![RpcApi {
            namespace: "miner",
            version: "1.0",
            public: true,
            service: EngineApi::new(chain, self.clone()),
        }]
    }
}
