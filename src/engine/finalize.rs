use std::sync::atomic::Ordering;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use tracing::{debug, error, trace};

use crate::abi;
use crate::chain::ChainReader;
use crate::errors::{EngineError, EngineResult};
use crate::params::{
    BLACKLIST_REGISTRY, BLOCK_REWARD, EMPTY_LIST_HASH, EPHEMERAL, MIGRATION_CONTRACT,
    SPORK_REGISTRY, TREASURY,
};
use crate::state::{BlockState, GasPool};
use crate::types::{Block, Header, Receipt, Transaction};

use super::Engine;

impl Engine {
    /// Runs the consensus state transitions after the importer has applied
    /// the regular transactions, and assembles the final block. The incoming
    /// transaction list may carry a miner-declared suffix of consensus
    /// transactions; it is split off, re-derived, and must round-trip
    /// exactly.
    pub fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
        state: &mut dyn BlockState,
        txs: Vec<Transaction>,
        _uncles: &[Header],
        receipts: Vec<Receipt>,
    ) -> EngineResult<(Block, Vec<Receipt>)> {
        let mut txs = txs;
        let split = txs
            .iter()
            .rposition(|tx| !tx.is_consensus())
            .map(|index| index + 1)
            .unwrap_or(0);
        let ctxs = txs.split_off(split);

        let (block, receipts) = self.finalize_inner(chain, header, state, txs.clone(), receipts)?;

        let new_txs = &block.transactions()[txs.len()..];
        if new_txs.len() != ctxs.len() {
            trace!(
                ntxs = new_txs.len(),
                ctxs = ctxs.len(),
                "consensus tx length mismatch"
            );
            return Err(EngineError::InvalidConsensusTx);
        }
        for (pos, (new_tx, declared)) in new_txs.iter().zip(ctxs.iter()).enumerate() {
            if new_tx.hash() != declared.hash() {
                trace!(
                    pos,
                    ntx = %new_tx.hash(),
                    ctx = %declared.hash(),
                    "consensus tx hash mismatch"
                );
                return Err(EngineError::InvalidConsensusTx);
            }
        }

        Ok((block, receipts))
    }

    pub(crate) fn finalize_inner(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
        state: &mut dyn BlockState,
        txs: Vec<Transaction>,
        receipts: Vec<Receipt>,
    ) -> EngineResult<(Block, Vec<Receipt>)> {
        // A zeroed coinbase means mining has not picked the proposer yet;
        // governance finalisation would run against the wrong inputs.
        let (txs, receipts) = if header.coinbase != Address::ZERO {
            self.gov_finalize(header, state, txs, receipts)?
        } else {
            (txs, receipts)
        };

        header.root = state.intermediate_root(chain.config().is_eip158(header.number));
        header.uncle_hash = EMPTY_LIST_HASH;

        let block = Block::new(header.clone(), txs, Vec::new(), &receipts);
        Ok((block, receipts))
    }

    fn gov_finalize(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        txs: Vec<Transaction>,
        receipts: Vec<Receipt>,
    ) -> EngineResult<(Vec<Transaction>, Vec<Receipt>)> {
        self.process_consensus_gas_limits(header, state)?;
        let (txs, receipts) = self.process_block_rewards(header, state, txs, receipts)?;
        self.process_masternodes(header, state)?;
        self.process_blacklists(header, state)?;
        let (txs, receipts) = self.process_drainable(header, state, txs, receipts)?;
        let (txs, receipts) = self.finalize_migration(header, state, txs, receipts)?;
        Ok((txs, receipts))
    }

    /// Refreshes the engine's gas budgets from the spork registry.
    pub(crate) fn process_consensus_gas_limits(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
    ) -> EngineResult<()> {
        let input = abi::pack_call(&self.inner.spork_abi, "consensusGasLimits", &[])
            .map_err(|err| {
                error!(%err, "fail to prepare consensusGasLimits() call");
                err
            })?;
        let output = self
            .call_contract(
                header,
                state,
                self.inner.system_faucet,
                SPORK_REGISTRY,
                input,
                self.call_gas(),
            )
            .map_err(|err| {
                error!(%err, "failed in consensusGasLimits() call");
                err
            })?;
        let (call_gas, xfer_gas) =
            abi::unpack_uint_pair(&self.inner.spork_abi, "consensusGasLimits", &output.output)
                .map_err(|err| {
                    error!(%err, "failed to unpack consensusGasLimits() call");
                    err
                })?;

        let call_gas = u64::try_from(call_gas).unwrap_or(u64::MAX);
        let xfer_gas = u64::try_from(xfer_gas).unwrap_or(u64::MAX);
        self.inner.call_gas.store(call_gas, Ordering::Relaxed);
        self.inner.xfer_gas.store(xfer_gas, Ordering::Relaxed);
        trace!(call = call_gas, xfer = xfer_gas, "consensus gas");

        Ok(())
    }

    /// Reads the pending reward from the block-reward contract and applies
    /// one consensus transaction paying it out.
    pub(crate) fn process_block_rewards(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        mut txs: Vec<Transaction>,
        mut receipts: Vec<Receipt>,
    ) -> EngineResult<(Vec<Transaction>, Vec<Receipt>)> {
        let query = abi::pack_call(
            &self.inner.reward_abi,
            "getReward",
            &[DynSolValue::Uint(U256::from(header.number), 256)],
        )?;
        let output = self.call_contract(
            header,
            state,
            self.inner.system_faucet,
            BLOCK_REWARD,
            query,
            self.call_gas(),
        )?;
        let amount = abi::unpack_uint(&self.inner.reward_abi, "getReward", &output.output)?;

        let input = abi::pack_call(&self.inner.reward_abi, "reward", &[])?;
        let tx = Transaction::consensus(EPHEMERAL, BLOCK_REWARD, amount, self.xfer_gas(), input);
        self.apply_consensus_tx(header, state, tx, &mut txs, &mut receipts)?;
        Ok((txs, receipts))
    }

    /// Sweeps the full balance of every drainable blacklisted account into
    /// the treasury.
    pub(crate) fn process_drainable(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        mut txs: Vec<Transaction>,
        mut receipts: Vec<Receipt>,
    ) -> EngineResult<(Vec<Transaction>, Vec<Receipt>)> {
        let query = abi::pack_call(&self.inner.blacklist_abi, "enumerateDrainable", &[])?;
        let output = self.call_contract(
            header,
            state,
            self.inner.system_faucet,
            BLACKLIST_REGISTRY,
            query,
            self.inner.unlimited_gas,
        )?;
        let drainable = abi::unpack_address_array(
            &self.inner.blacklist_abi,
            "enumerateDrainable",
            &output.output,
        )?;

        for addr in drainable {
            let balance = state.balance(&addr);
            if balance.is_zero() {
                continue;
            }
            let input = abi::pack_call(&self.inner.treasury_abi, "contribute", &[])?;
            let tx = Transaction::consensus(addr, TREASURY, balance, self.xfer_gas(), input);
            self.apply_consensus_tx(header, state, tx, &mut txs, &mut receipts)?;
            debug!(%addr, %balance, "drained blacklisted balance");
        }
        Ok((txs, receipts))
    }

    /// The one-off Gen-2 bootstrap: the migration block carries a single
    /// engine-derived transaction against the migration contract.
    pub(crate) fn finalize_migration(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        mut txs: Vec<Transaction>,
        mut receipts: Vec<Receipt>,
    ) -> EngineResult<(Vec<Transaction>, Vec<Receipt>)> {
        if !header.is_migration() {
            return Ok((txs, receipts));
        }
        let tx = Transaction::consensus(
            EPHEMERAL,
            MIGRATION_CONTRACT,
            U256::ZERO,
            self.xfer_gas(),
            Vec::new(),
        );
        self.apply_consensus_tx(header, state, tx, &mut txs, &mut receipts)?;
        Ok((txs, receipts))
    }

    fn apply_consensus_tx(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        tx: Transaction,
        txs: &mut Vec<Transaction>,
        receipts: &mut Vec<Receipt>,
    ) -> EngineResult<()> {
        let mut gas_pool = GasPool::new(tx.gas);
        let applied = state.apply_message(&tx.as_message(), header, &mut gas_pool)?;
        let cumulative = receipts
            .last()
            .map(|receipt| receipt.cumulative_gas_used)
            .unwrap_or(0)
            + applied.gas_used;
        receipts.push(Receipt::succeeded(tx.hash(), cumulative, applied.gas_used));
        txs.push(tx);
        Ok(())
    }
}
