use alloy_primitives::{Address, U256};

use crate::errors::EngineResult;
use crate::state::{BlockState, CallMessage, CallOutput, GasPool};
use crate::types::Header;

use super::Engine;

impl Engine {
    /// Executes a governance read against the given state. A fresh gas pool
    /// is allocated per call and the snapshot is reverted on every return
    /// path: consensus reads must not mutate the state the next transaction
    /// commits against.
    pub(crate) fn call_contract(
        &self,
        header: &Header,
        state: &mut dyn BlockState,
        from: Address,
        to: Address,
        input: Vec<u8>,
        gas: u64,
    ) -> EngineResult<CallOutput> {
        let msg = CallMessage {
            from,
            to: Some(to),
            nonce: 0,
            value: U256::ZERO,
            gas,
            gas_price: U256::ZERO,
            input: input.into(),
        };
        let mut gas_pool = GasPool::new(gas);

        let snapshot = state.snapshot();
        let result = state.apply_message(&msg, header, &mut gas_pool);
        state.revert_to_snapshot(snapshot);
        result
    }
}
