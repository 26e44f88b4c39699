use alloy_primitives::{keccak256, B256, U256};
use alloy_rlp::RlpEncodable;

use crate::chain::ChainReader;
use crate::params::MINIMUM_DIFFICULTY;
use crate::types::Header;

use super::{Engine, TimeTarget};

#[derive(RlpEncodable)]
struct ModifierContent {
    parent_hash: B256,
    parent_modifier: B256,
    time: u64,
}

impl Engine {
    /// Difficulty moves the parent value proportionally towards the spacing
    /// target: blocks arriving early raise it, late blocks lower it. The
    /// adjustment per block is bounded to one gap's worth in either
    /// direction.
    pub(crate) fn calc_pos_difficulty(
        &self,
        chain: &dyn ChainReader,
        time: u64,
        parent: &Header,
        time_target: &TimeTarget,
    ) -> U256 {
        let gap = chain.config().target_block_gap.max(1);
        let target = time_target.block_target.max(time_target.period_target);
        let parent_difficulty = parent.difficulty.max(MINIMUM_DIFFICULTY);

        if time < target {
            let acceleration = U256::from((target - time).min(gap));
            let step = parent_difficulty.saturating_mul(acceleration) / U256::from(gap);
            parent_difficulty.saturating_add(step)
        } else if time > target {
            let brake = U256::from((time - target).min(gap));
            let step = parent_difficulty.saturating_mul(brake) / U256::from(2 * gap);
            (parent_difficulty - step).max(MINIMUM_DIFFICULTY)
        } else {
            parent_difficulty
        }
    }

    /// Deterministic PoS modifier stored in `mix_digest`: binds the header to
    /// its parent and timestamp without revealing private information.
    pub(crate) fn calc_pos_modifier(&self, time: u64, parent: &Header) -> B256 {
        keccak256(alloy_rlp::encode(&ModifierContent {
            parent_hash: parent.hash(),
            parent_modifier: parent.mix_digest,
            time,
        }))
    }
}
