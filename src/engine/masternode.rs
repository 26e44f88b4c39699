use alloy_primitives::{Address, B256};
use tracing::{debug, error, warn};

use crate::abi;
use crate::errors::EngineResult;
use crate::params::{BLACKLIST, BLACKLIST_REGISTRY, MASTERNODE_LIST, MASTERNODE_REGISTRY};
use crate::state::{self, BlockState, KeepStorage};
use crate::types::Header;

use super::Engine;

impl Engine {
    /// Mirrors the active masternode set into the reserved list object.
    pub(crate) fn process_masternodes(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
    ) -> EngineResult<()> {
        let input = abi::pack_call(&self.inner.mnreg_abi, "enumerateActive", &[])
            .map_err(|err| {
                error!(%err, "fail to prepare enumerateActive() call");
                err
            })?;
        let output = self
            .call_contract(
                header,
                state,
                MASTERNODE_REGISTRY,
                MASTERNODE_REGISTRY,
                input,
                self.inner.unlimited_gas,
            )
            .map_err(|err| {
                error!(%err, "failed in enumerateActive() call");
                err
            })?;
        if output.gas_used > self.call_gas() {
            warn!(
                gas = output.gas_used,
                limit = self.call_gas(),
                "MasternodeRegistry::enumerateActive() took excessive gas"
            );
        }

        let masternodes =
            abi::unpack_address_array(&self.inner.mnreg_abi, "enumerateActive", &output.output)
                .map_err(|err| {
                    error!(%err, "failed to unpack enumerateActive() call");
                    err
                })?;
        debug!(?masternodes, "masternode list");

        sync_roster(state, &MASTERNODE_LIST, &masternodes);
        Ok(())
    }

    /// Mirrors the blacklist registry into the reserved blacklist object the
    /// seal verifier reads.
    pub(crate) fn process_blacklists(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
    ) -> EngineResult<()> {
        let input = abi::pack_call(&self.inner.blacklist_abi, "enumerate", &[])
            .map_err(|err| {
                error!(%err, "fail to prepare enumerate() call");
                err
            })?;
        let output = self
            .call_contract(
                header,
                state,
                BLACKLIST_REGISTRY,
                BLACKLIST_REGISTRY,
                input,
                self.inner.unlimited_gas,
            )
            .map_err(|err| {
                error!(%err, "failed in enumerate() call");
                err
            })?;
        let blacklist =
            abi::unpack_address_array(&self.inner.blacklist_abi, "enumerate", &output.output)
                .map_err(|err| {
                    error!(%err, "failed to unpack enumerate() call");
                    err
                })?;
        debug!(?blacklist, "blacklist");

        sync_roster(state, &BLACKLIST, &blacklist);
        Ok(())
    }
}

/// Writes each roster entry as a `0x01` slot keyed by the padded address and
/// prunes slots whose address is no longer listed.
fn sync_roster(state: &mut dyn BlockState, object: &Address, addrs: &[Address]) {
    let value = B256::with_last_byte(1);
    let mut keep = KeepStorage::with_capacity(addrs.len());
    for addr in addrs {
        let key = state::address_key(addr);
        if state.storage_value(object, &key) == B256::ZERO {
            debug!(%addr, object = %object, "new roster entry");
        }
        state.set_storage_value(object, key, value);
        keep.insert(key);
    }
    state.cleanup_storage(object, &keep);
}
