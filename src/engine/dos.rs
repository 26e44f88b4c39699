use std::sync::atomic::Ordering;

use alloy_primitives::{Address, B256};
use dashmap::mapref::entry::Entry;

use crate::chain::ChainReader;
use crate::errors::{EngineError, EngineResult};
use crate::params::{OLD_FORK_PERIOD, STAKE_THROTTLE};
use crate::types::Header;

use super::Engine;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct StakeKey {
    pub coinbase: Address,
    pub parent: B256,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StakeSeen {
    pub block: B256,
    pub ts: u64,
}

impl StakeSeen {
    pub(crate) fn is_active(&self, now: u64) -> bool {
        now.saturating_sub(self.ts) < STAKE_THROTTLE
    }
}

impl Engine {
    pub(crate) fn check_dos(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parent: &Header,
    ) -> EngineResult<()> {
        let now = self.now();
        let old_fork_threshold = now.saturating_sub(OLD_FORK_PERIOD);

        // An old fork is acceptable only while the local head is equally
        // stale; once the head is fresh, deeply stale histories are refused.
        if parent.time < old_fork_threshold
            && chain.current_header().time > old_fork_threshold
        {
            return Err(EngineError::DoSThrottle);
        }

        // A proposer gets one block per parent per throttle window; a second
        // distinct block within the window is a double-sign.
        let key = StakeKey {
            coinbase: header.coinbase,
            parent: header.parent_hash,
        };
        let seen = StakeSeen {
            block: header.hash(),
            ts: now,
        };

        match self.inner.known_stakes.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(seen);
            }
            Entry::Occupied(mut entry) => {
                let previous = *entry.get();
                if previous.is_active(now) && previous.block != seen.block {
                    return Err(EngineError::DoSThrottle);
                }
                entry.insert(seen);
            }
        }

        if self.inner.next_ks_purge.load(Ordering::Relaxed) < now {
            self.inner
                .next_ks_purge
                .store(now + STAKE_THROTTLE, Ordering::Relaxed);
            self.inner.known_stakes.retain(|_, value| value.is_active(now));
        }

        Ok(())
    }
}
