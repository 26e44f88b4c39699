use crate::chain::ChainReader;
use crate::errors::{EngineError, EngineResult};
use crate::types::Header;

use super::Engine;

/// Admissible timestamp window for a child of `parent`, plus the spacing
/// targets the difficulty adjustment steers towards.
#[derive(Clone, Copy, Debug)]
pub struct TimeTarget {
    pub min_time: u64,
    pub max_time: u64,
    pub block_target: u64,
    pub period_target: u64,
}

impl Engine {
    pub(crate) fn calc_time_target(&self, chain: &dyn ChainReader, parent: &Header) -> TimeTarget {
        let config = chain.config();
        let now = self.now();

        let min_time = parent.time + 1;
        let max_time = now + config.allowed_future_gap;
        let block_target = parent.time + config.target_block_gap;

        // Walk back over the averaging window; the period target keeps the
        // long-run spacing at the block gap even when individual blocks
        // drift.
        let mut ancestor = parent.clone();
        let mut depth: u64 = 0;
        while depth < config.target_period_blocks && ancestor.number > 0 {
            match chain.get_header(&ancestor.parent_hash, ancestor.number - 1) {
                Some(header) => {
                    ancestor = header;
                    depth += 1;
                }
                None => break,
            }
        }
        let period_target = ancestor.time + (depth + 1) * config.target_block_gap;

        TimeTarget {
            min_time,
            max_time,
            block_target,
            period_target,
        }
    }

    pub(crate) fn check_time(&self, header: &Header, target: &TimeTarget) -> EngineResult<()> {
        if header.time < target.min_time {
            return Err(EngineError::TimestampTooEarly {
                have: header.time,
                min: target.min_time,
            });
        }
        if header.time > target.max_time {
            return Err(EngineError::TimestampTooFar {
                have: header.time,
                max: target.max_time,
            });
        }
        Ok(())
    }

    /// Clamps a freshly prepared header into the admissible window.
    pub(crate) fn enforce_time(&self, header: &mut Header, target: &TimeTarget) {
        if header.time < target.min_time {
            header.time = target.min_time;
        }
        if header.time > target.max_time && target.max_time >= target.min_time {
            header.time = target.max_time;
        }
    }
}
