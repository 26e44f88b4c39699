use alloy_primitives::{address, b256, Address, B256, U256};

// Reserved governance accounts. The low address space below 0x400 is never
// reachable by key-derived accounts, so these act as well-known singletons.
pub const BLOCK_REWARD: Address = address!("0000000000000000000000000000000000000300");
pub const TREASURY: Address = address!("0000000000000000000000000000000000000301");
pub const MASTERNODE_REGISTRY: Address = address!("0000000000000000000000000000000000000302");
pub const STAKER_REWARD: Address = address!("0000000000000000000000000000000000000303");
pub const BACKBONE_REWARD: Address = address!("0000000000000000000000000000000000000304");
pub const SPORK_REGISTRY: Address = address!("0000000000000000000000000000000000000305");
pub const CHECKPOINT_REGISTRY: Address = address!("0000000000000000000000000000000000000306");
pub const BLACKLIST_REGISTRY: Address = address!("0000000000000000000000000000000000000307");
pub const MIGRATION_CONTRACT: Address = address!("0000000000000000000000000000000000000308");
pub const MASTERNODE_TOKEN: Address = address!("0000000000000000000000000000000000000309");
pub const BLACKLIST: Address = address!("000000000000000000000000000000000000030a");
pub const WHITELIST: Address = address!("000000000000000000000000000000000000030b");
pub const MASTERNODE_LIST: Address = address!("000000000000000000000000000000000000030c");

pub const SYSTEM_FAUCET: Address = address!("0000000000000000000000000000000000000320");
// Virtual sender of minting consensus transactions ("Ephemeral" in ASCII).
pub const EPHEMERAL: Address = address!("0000000000000000000000457068656d6572616c");

/// Keccak-256 of the RLP encoding of the empty list.
pub const EMPTY_LIST_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Length of the recoverable header signature `(r || s || v)`.
pub const SEAL_LEN: usize = 65;

/// Alternative histories older than this are refused once the local head is
/// fresh, in seconds.
pub const OLD_FORK_PERIOD: u64 = 15 * 60;

/// Window within which a `(coinbase, parent)` slot may be sealed only once,
/// in seconds.
pub const STAKE_THROTTLE: u64 = 60;

/// Gas allowance for governance enumeration calls that must never run dry.
pub const UNLIMITED_GAS: u64 = 1 << 40;

pub const GAS_LIMIT_CAP: u64 = 0x7fff_ffff_ffff_ffff;

pub const MINIMUM_DIFFICULTY: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Wei per whole coin; stake weight is measured in whole coins.
pub const ONE_COIN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);
