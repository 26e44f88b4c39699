use std::sync::Arc;
use std::thread;
use std::time::Duration;

use alloy_primitives::Bloom;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{error, info, trace, warn};

use crate::chain::ChainReader;
use crate::errors::{EngineError, EngineResult};
use crate::params::ONE_COIN;
use crate::state::GasPool;
use crate::types::{Block, Header, Receipt, Transaction};

use super::seal::{pos_hash, pos_hash_meets_target};
use super::Engine;

/// Outcome of a sealing attempt. An empty result signals the miner loop to
/// retry with a new candidate.
pub struct SealResult {
    pub block: Option<Block>,
    pub receipts: Vec<Receipt>,
}

impl SealResult {
    fn none() -> Self {
        Self {
            block: None,
            receipts: Vec::new(),
        }
    }
}

impl Engine {
    /// Launches the PoS sealing task for the block and returns immediately.
    /// The result is published on `results` without blocking; it is dropped
    /// when the receiver is gone.
    pub fn seal(
        &self,
        chain: Arc<dyn ChainReader>,
        block: Block,
        results: Sender<SealResult>,
        stop: Receiver<()>,
    ) -> EngineResult<()> {
        let engine = self.clone();
        thread::spawn(move || engine.seal_task(chain, block, results, stop));
        Ok(())
    }

    fn seal_task(
        &self,
        chain: Arc<dyn ChainReader>,
        block: Block,
        results: Sender<SealResult>,
        stop: Receiver<()>,
    ) {
        let mut header = block.header().clone();
        let original_txhash = header.tx_hash;
        let mut result = SealResult {
            block: Some(block.clone()),
            receipts: Vec::new(),
        };

        if header.number != 0 {
            let mined = match self.mine(chain.as_ref(), &mut header, &stop) {
                Ok(mined) => mined,
                Err(err) => {
                    error!(%err, "PoS miner error");
                    let _ = results.try_send(SealResult::none());
                    return;
                }
            };
            if !mined {
                let _ = results.try_send(SealResult::none());
                return;
            }

            // Mining may have changed the coinbase and time, so every
            // transaction is re-applied against the new header state to keep
            // gas accounting and distribution consensus-exact.
            result = match self.recreate_block(chain.as_ref(), &header, block.transactions()) {
                Ok(result) => result,
                Err(err) => {
                    error!(%err, "PoS miner error");
                    let _ = results.try_send(SealResult::none());
                    return;
                }
            };
            header = result
                .block
                .as_ref()
                .expect("recreated block is present")
                .header()
                .clone();
        }

        let sighash = self.signature_hash(&header);
        trace!(%sighash, "PoS seal hash");

        let Some(callbacks) = self.callbacks() else {
            error!("miner callbacks are not set");
            return;
        };
        match (callbacks.signer)(header.coinbase, sighash.as_slice()) {
            Ok(signature) => header.signature = signature.into(),
            Err(err) => {
                error!(%err, "PoS miner error");
                return;
            }
        }

        let sealed = result
            .block
            .take()
            .expect("unsealed block is present")
            .with_seal(header.clone());
        self.remember_txhash(header.tx_hash, original_txhash);

        let block_hash = sealed.hash();
        match results.try_send(SealResult {
            block: Some(sealed),
            receipts: result.receipts,
        }) {
            Ok(()) => info!(block = %block_hash, "PoS seal has submitted solution"),
            Err(_) => warn!(sealhash = %self.seal_hash(&header), "PoS seal is not read by miner"),
        }
    }

    /// Scans `(coinbase, time, nonce)` candidates until one meets the PoS
    /// target, the caller signals stop, or no candidate exists under the
    /// nonce ceiling. On success the winning fields are written to `header`.
    pub(crate) fn mine(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
        stop: &Receiver<()>,
    ) -> EngineResult<bool> {
        let parent = chain
            .get_header(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::UnknownAncestor)?;
        let state = chain
            .calculate_block_state(&header.parent_hash, header.number - 1)
            .ok_or(EngineError::MissingState)?;

        let accounts = match self.callbacks() {
            Some(callbacks) => (callbacks.accounts)(),
            None => Vec::new(),
        };
        if accounts.is_empty() {
            return Ok(false);
        }

        let time_target = self.calc_time_target(chain, &parent);
        let nonce_cap = self.get_miner_nonce_cap();
        let mut time = time_target.min_time;

        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return Ok(false),
                Err(TryRecvError::Empty) => {}
            }

            // Candidate times ahead of the wall clock wait for it.
            while time > self.now() + chain.config().allowed_future_gap {
                match stop.recv_timeout(Duration::from_millis(250)) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(false),
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            let modifier = self.calc_pos_modifier(time, &parent);
            let difficulty = self.calc_pos_difficulty(chain, time, &parent, &time_target);

            for &coinbase in &accounts {
                let weight = state.balance(&coinbase) / ONE_COIN;
                if weight.is_zero() {
                    continue;
                }
                for nonce in 0..=nonce_cap {
                    let hash = pos_hash(modifier, coinbase, nonce);
                    if pos_hash_meets_target(hash, difficulty, weight) {
                        header.coinbase = coinbase;
                        header.time = time;
                        header.nonce = nonce;
                        header.mix_digest = modifier;
                        header.difficulty = difficulty;
                        return Ok(true);
                    }
                }
            }

            time += 1;
        }
    }

    /// Re-executes the original transactions against the mined header and
    /// finalises the result.
    pub(crate) fn recreate_block(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        txs: &[Transaction],
    ) -> EngineResult<SealResult> {
        let Some(mut blstate) =
            chain.calculate_block_state(&header.parent_hash, header.number - 1)
        else {
            return Err(EngineError::UnknownAncestor);
        };

        let mut header = header.clone();
        let mut gas_pool = GasPool::new(header.gas_limit);
        let mut used_gas = 0u64;
        header.gas_used = 0;
        header.bloom = Bloom::ZERO;

        let mut receipts = Vec::with_capacity(txs.len());
        for tx in txs {
            let applied = blstate.apply_message(&tx.as_message(), &header, &mut gas_pool)?;
            used_gas += applied.gas_used;
            receipts.push(Receipt::succeeded(tx.hash(), used_gas, applied.gas_used));
        }
        header.gas_used = used_gas;

        let (block, receipts) =
            self.finalize_inner(chain, &mut header, blstate.as_mut(), txs.to_vec(), receipts)?;
        Ok(SealResult {
            block: Some(block),
            receipts,
        })
    }
}
