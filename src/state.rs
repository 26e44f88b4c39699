use std::collections::HashSet;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::errors::{EngineError, EngineResult};
use crate::params::BLACKLIST;
use crate::types::Header;

/// Storage slots to retain when pruning a reserved storage object.
pub type KeepStorage = HashSet<B256>;

/// A message applied through the external EVM collaborator.
#[derive(Clone, Debug)]
pub struct CallMessage {
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas: u64,
    pub gas_price: U256,
    pub input: Bytes,
}

#[derive(Clone, Debug)]
pub struct CallOutput {
    pub output: Vec<u8>,
    pub gas_used: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct GasPool(u64);

impl GasPool {
    pub fn new(gas: u64) -> Self {
        Self(gas)
    }

    pub fn gas(&self) -> u64 {
        self.0
    }

    pub fn sub_gas(&mut self, amount: u64) -> EngineResult<()> {
        if amount > self.0 {
            return Err(EngineError::GasPoolExhausted {
                requested: amount,
                remaining: self.0,
            });
        }
        self.0 -= amount;
        Ok(())
    }
}

/// Capability set of the state/EVM collaborator the engine runs against. The
/// trie and interpreter live outside this crate; the engine only snapshots,
/// queries, applies messages and edits reserved storage objects.
pub trait BlockState {
    fn snapshot(&mut self) -> usize;
    fn revert_to_snapshot(&mut self, id: usize);
    fn balance(&self, address: &Address) -> U256;
    fn code_size(&self, address: &Address) -> usize;
    fn storage_value(&self, object: &Address, key: &B256) -> B256;
    fn set_storage_value(&mut self, object: &Address, key: B256, value: B256);
    /// Drops every slot of the object that is not in `keep`.
    fn cleanup_storage(&mut self, object: &Address, keep: &KeepStorage);
    fn apply_message(
        &mut self,
        msg: &CallMessage,
        header: &Header,
        gas_pool: &mut GasPool,
    ) -> EngineResult<CallOutput>;
    fn intermediate_root(&mut self, eip158: bool) -> B256;
}

/// Reserved-object key of an account address: the address left-padded to a
/// word, matching the on-chain registry layout.
pub fn address_key(address: &Address) -> B256 {
    address.into_word()
}

pub fn is_blacklisted(state: &dyn BlockState, address: &Address) -> bool {
    state.storage_value(&BLACKLIST, &address_key(address)) != B256::ZERO
}
