use alloy_primitives::{keccak256, Address, B256, U256, U512};
use alloy_rlp::RlpEncodable;
use tracing::{debug, error, trace};

use crate::abi;
use crate::chain::ChainReader;
use crate::crypto::{ecrecover, pubkey_to_address, validate_signature_values};
use crate::errors::{EngineError, EngineResult};
use crate::params::{ONE_COIN, SEAL_LEN};
use crate::state;
use crate::types::Header;

use super::Engine;

#[derive(RlpEncodable)]
struct PosHashContent {
    modifier: B256,
    coinbase: Address,
    nonce: u64,
}

/// Hash-of-stake digest for a candidate `(modifier, coinbase, nonce)` tuple.
pub(crate) fn pos_hash(modifier: B256, coinbase: Address, nonce: u64) -> B256 {
    keccak256(alloy_rlp::encode(&PosHashContent {
        modifier,
        coinbase,
        nonce,
    }))
}

/// The candidate wins when its digest, scaled down by the stake weight in
/// whole coins, falls under the difficulty target.
pub(crate) fn pos_hash_meets_target(hash: B256, difficulty: U256, weight: U256) -> bool {
    if weight.is_zero() {
        return false;
    }
    let difficulty = difficulty.max(U256::from(1));
    let target = U256::MAX / difficulty;
    widen(U256::from_be_bytes(hash.0)) <= widen(target).saturating_mul(widen(weight))
}

fn widen(value: U256) -> U512 {
    U512::from_be_slice(&value.to_be_bytes::<32>())
}

impl Engine {
    /// Checks the crypto seal: recovers the signer from the header signature
    /// and accepts it when it matches the coinbase directly or through the
    /// coinbase contract's delegated signer.
    pub fn verify_seal(&self, chain: &dyn ChainReader, header: &Header) -> EngineResult<()> {
        if header.number == 0 {
            return Ok(());
        }
        let parent_number = header.number - 1;
        let mut state = chain
            .calculate_block_state(&header.parent_hash, parent_number)
            .ok_or_else(|| {
                error!(parent = %header.parent_hash, "PoS state root failure");
                EngineError::MissingState
            })?;

        if state::is_blacklisted(state.as_ref(), &header.coinbase) {
            debug!(addr = %header.coinbase, "blacklisted coinbase");
            return Err(EngineError::BlacklistedCoinbase);
        }

        if header.signature.len() != SEAL_LEN {
            return Err(EngineError::MissingSignature);
        }

        let sighash = self.signature_hash(header);
        trace!(%sighash, "PoS verify signature hash");

        let r = U256::from_be_slice(&header.signature[..32]);
        let s = U256::from_be_slice(&header.signature[32..64]);
        let v = header.signature[64];
        if !validate_signature_values(v, r, s) {
            return Err(EngineError::InvalidSignatureValues);
        }

        let pubkey = ecrecover(sighash, &header.signature)?;
        let addr = pubkey_to_address(&pubkey);

        if addr == header.coinbase {
            return Ok(());
        }

        // Delegated PoS: a contract coinbase names its legitimate signer.
        let parent = chain
            .get_header(&header.parent_hash, parent_number)
            .ok_or(EngineError::UnknownAncestor)?;

        if state.code_size(&header.coinbase) > 0 {
            let input = abi::pack_call(&self.inner.dpos_abi, "signerAddress", &[])
                .map_err(|err| {
                    error!(%err, "fail to prepare signerAddress() call");
                    err
                })?;
            let output = self
                .call_contract(
                    &parent,
                    state.as_mut(),
                    self.inner.system_faucet,
                    header.coinbase,
                    input,
                    self.call_gas(),
                )
                .map_err(|err| {
                    trace!(%err, "fail to get signerAddress()");
                    err
                })?;
            let signer =
                abi::unpack_address(&self.inner.dpos_abi, "signerAddress", &output.output)
                    .map_err(|err| {
                        error!(%err, "failed to unpack signerAddress() call");
                        err
                    })?;
            if signer == addr {
                return Ok(());
            }
            trace!(%addr, %signer, "PoS seal compare");
        } else {
            trace!(%addr, coinbase = %header.coinbase, "PoS seal compare");
        }

        Err(EngineError::InvalidSignature)
    }

    /// Hash-of-stake check: the sealed tuple must meet the target for the
    /// coinbase's stake weight in the parent state.
    pub(crate) fn verify_pos_hash(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
    ) -> EngineResult<()> {
        if header.number == 0 {
            return Ok(());
        }
        let state = chain
            .calculate_block_state(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::MissingState)?;
        let weight = state.balance(&header.coinbase) / ONE_COIN;
        let hash = pos_hash(header.mix_digest, header.coinbase, header.nonce);
        if !pos_hash_meets_target(hash, header.difficulty, weight) {
            return Err(EngineError::InvalidPoSHash);
        }
        Ok(())
    }
}
