#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use parking_lot::RwLock;
use tempfile::TempDir;

use nuclear_consensus::chain::ChainReader;
use nuclear_consensus::config::ChainConfig;
use nuclear_consensus::errors::{EngineError, EngineResult};
use nuclear_consensus::params;
use nuclear_consensus::state::{BlockState, CallMessage, CallOutput, GasPool, KeepStorage};
use nuclear_consensus::types::{Header, Transaction};
use nuclear_consensus::{abi, Engine, Storage};

pub const BASE_CALL_GAS: u64 = 21_000;
pub const FIXED_NOW: u64 = 1_700_000_000;
/// The `xferGas` value `governed_state` programs into the spork registry.
pub const GOVERNED_XFER_GAS: u64 = 3_000_000;

/// State/EVM collaborator double with programmable contract outputs.
#[derive(Clone, Default)]
pub struct MockState {
    pub balances: HashMap<Address, U256>,
    pub code_sizes: HashMap<Address, usize>,
    pub storage: HashMap<Address, HashMap<B256, B256>>,
    pub call_outputs: HashMap<(Address, [u8; 4]), Vec<u8>>,
    snapshots: Vec<Snapshot>,
}

#[derive(Clone)]
struct Snapshot {
    balances: HashMap<Address, U256>,
    storage: HashMap<Address, HashMap<B256, B256>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: Address, amount: U256) -> Self {
        self.balances.insert(address, amount);
        self
    }

    pub fn with_code(mut self, address: Address, size: usize) -> Self {
        self.code_sizes.insert(address, size);
        self
    }

    pub fn with_call_output(mut self, to: Address, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.call_outputs.insert((to, selector), output);
        self
    }

    pub fn set_blacklisted(&mut self, address: Address) {
        self.storage
            .entry(params::BLACKLIST)
            .or_default()
            .insert(address.into_word(), B256::with_last_byte(1));
    }

    pub fn root(&mut self) -> B256 {
        self.intermediate_root(true)
    }
}

impl BlockState for MockState {
    fn snapshot(&mut self) -> usize {
        self.snapshots.push(Snapshot {
            balances: self.balances.clone(),
            storage: self.storage.clone(),
        });
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        let snapshot = self.snapshots[id].clone();
        self.balances = snapshot.balances;
        self.storage = snapshot.storage;
        self.snapshots.truncate(id);
    }

    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn code_size(&self, address: &Address) -> usize {
        self.code_sizes.get(address).copied().unwrap_or_default()
    }

    fn storage_value(&self, object: &Address, key: &B256) -> B256 {
        self.storage
            .get(object)
            .and_then(|slots| slots.get(key))
            .copied()
            .unwrap_or_default()
    }

    fn set_storage_value(&mut self, object: &Address, key: B256, value: B256) {
        self.storage.entry(*object).or_default().insert(key, value);
    }

    fn cleanup_storage(&mut self, object: &Address, keep: &KeepStorage) {
        if let Some(slots) = self.storage.get_mut(object) {
            slots.retain(|key, _| keep.contains(key));
        }
    }

    fn apply_message(
        &mut self,
        msg: &CallMessage,
        _header: &Header,
        gas_pool: &mut GasPool,
    ) -> EngineResult<CallOutput> {
        if msg.gas < BASE_CALL_GAS {
            return Err(EngineError::Evm("intrinsic gas too low".into()));
        }
        gas_pool.sub_gas(BASE_CALL_GAS)?;

        if !msg.value.is_zero() {
            if msg.from != params::EPHEMERAL {
                let available = self.balance(&msg.from);
                if available < msg.value {
                    return Err(EngineError::Evm("insufficient balance".into()));
                }
                self.balances.insert(msg.from, available - msg.value);
            }
            if let Some(to) = msg.to {
                let credited = self.balance(&to) + msg.value;
                self.balances.insert(to, credited);
            }
        }

        let output = msg
            .to
            .filter(|_| msg.input.len() >= 4)
            .and_then(|to| {
                let mut selector = [0u8; 4];
                selector.copy_from_slice(&msg.input[..4]);
                self.call_outputs.get(&(to, selector)).cloned()
            })
            .unwrap_or_default();

        Ok(CallOutput {
            output,
            gas_used: BASE_CALL_GAS,
        })
    }

    fn intermediate_root(&mut self, _eip158: bool) -> B256 {
        let mut material = Vec::new();
        let mut balances: Vec<_> = self.balances.iter().collect();
        balances.sort_by_key(|(address, _)| **address);
        for (address, amount) in balances {
            material.extend_from_slice(address.as_slice());
            material.extend_from_slice(&amount.to_be_bytes::<32>());
        }
        let mut objects: Vec<_> = self.storage.iter().collect();
        objects.sort_by_key(|(address, _)| **address);
        for (address, slots) in objects {
            let mut entries: Vec<_> = slots.iter().collect();
            entries.sort_by_key(|(key, _)| **key);
            for (key, value) in entries {
                material.extend_from_slice(address.as_slice());
                material.extend_from_slice(key.as_slice());
                material.extend_from_slice(value.as_slice());
            }
        }
        keccak256(&material)
    }
}

/// In-memory chain double serving headers and cloned state templates.
pub struct TestChain {
    config: ChainConfig,
    headers: RwLock<HashMap<B256, Header>>,
    canonical: RwLock<HashMap<u64, B256>>,
    head: RwLock<Header>,
    state: RwLock<MockState>,
}

impl TestChain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            headers: RwLock::new(HashMap::new()),
            canonical: RwLock::new(HashMap::new()),
            head: RwLock::new(Header::default()),
            state: RwLock::new(MockState::new()),
        }
    }

    pub fn insert(&self, header: Header) {
        let hash = header.hash();
        self.canonical.write().insert(header.number, hash);
        if header.number >= self.head.read().number {
            *self.head.write() = header.clone();
        }
        self.headers.write().insert(hash, header);
    }

    pub fn set_head(&self, header: Header) {
        *self.head.write() = header;
    }

    pub fn set_state(&self, state: MockState) {
        *self.state.write() = state;
    }
}

impl ChainReader for TestChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn current_header(&self) -> Header {
        self.head.read().clone()
    }

    fn get_header(&self, hash: &B256, _number: u64) -> Option<Header> {
        self.headers.read().get(hash).cloned()
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        let hash = self.canonical.read().get(&number).copied()?;
        self.headers.read().get(&hash).cloned()
    }

    fn calculate_block_state(&self, _hash: &B256, _number: u64) -> Option<Box<dyn BlockState>> {
        Some(Box::new(self.state.read().clone()))
    }
}

/// Engine over a throwaway database with a controllable clock.
pub fn test_engine() -> (Engine, Arc<AtomicU64>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let storage = Storage::open(dir.path()).expect("open storage");
    let clock = Arc::new(AtomicU64::new(FIXED_NOW));
    let handle = clock.clone();
    let engine = Engine::with_clock(
        ChainConfig::testnet(),
        storage,
        Box::new(move || handle.load(Ordering::SeqCst)),
    );
    (engine, clock, dir)
}

pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    selector
}

pub fn encode_uint(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

pub fn encode_uint_pair(first: U256, second: U256) -> Vec<u8> {
    let mut out = encode_uint(first);
    out.extend_from_slice(&encode_uint(second));
    out
}

pub fn encode_address(address: Address) -> Vec<u8> {
    address.into_word().to_vec()
}

pub fn encode_address_array(addresses: &[Address]) -> Vec<u8> {
    let mut out = encode_uint(U256::from(0x20u64));
    out.extend_from_slice(&encode_uint(U256::from(addresses.len() as u64)));
    for address in addresses {
        out.extend_from_slice(&encode_address(*address));
    }
    out
}

/// A state with every governance read the finaliser performs programmed to a
/// benign default: generous gas limits, a ten-coin reward and empty rosters.
pub fn governed_state() -> MockState {
    MockState::new()
        .with_call_output(
            params::SPORK_REGISTRY,
            selector("consensusGasLimits()"),
            encode_uint_pair(U256::from(30_000_000u64), U256::from(3_000_000u64)),
        )
        .with_call_output(
            params::BLOCK_REWARD,
            selector("getReward(uint256)"),
            encode_uint(U256::from(10u64) * params::ONE_COIN),
        )
        .with_call_output(
            params::MASTERNODE_REGISTRY,
            selector("enumerateActive()"),
            encode_address_array(&[]),
        )
        .with_call_output(
            params::BLACKLIST_REGISTRY,
            selector("enumerate()"),
            encode_address_array(&[]),
        )
        .with_call_output(
            params::BLACKLIST_REGISTRY,
            selector("enumerateDrainable()"),
            encode_address_array(&[]),
        )
}

/// The reward transaction `governed_state` makes the finaliser derive.
pub fn expected_reward_tx() -> Transaction {
    let reward_abi = abi::parse_abi(abi::BLOCK_REWARD_ABI);
    let input = abi::pack_call(&reward_abi, "reward", &[]).unwrap();
    Transaction::consensus(
        params::EPHEMERAL,
        params::BLOCK_REWARD,
        U256::from(10u64) * params::ONE_COIN,
        GOVERNED_XFER_GAS,
        input,
    )
}

pub fn expected_sweep_tx(from: Address, value: U256) -> Transaction {
    let treasury_abi = abi::parse_abi(abi::TREASURY_ABI);
    let input = abi::pack_call(&treasury_abi, "contribute", &[]).unwrap();
    Transaction::consensus(from, params::TREASURY, value, GOVERNED_XFER_GAS, input)
}

pub fn expected_migration_tx() -> Transaction {
    Transaction::consensus(
        params::EPHEMERAL,
        params::MIGRATION_CONTRACT,
        U256::ZERO,
        GOVERNED_XFER_GAS,
        Vec::new(),
    )
}

/// Parent header anchored at the fixed test clock.
pub fn parent_header(number: u64) -> Header {
    Header {
        number,
        time: FIXED_NOW,
        gas_limit: 8_000_000,
        difficulty: U256::from(1),
        ..Header::default()
    }
}

/// Child header prepared by the engine: timestamp clamped into the window,
/// modifier and difficulty filled in.
pub fn prepared_child(engine: &Engine, chain: &TestChain, parent: &Header) -> Header {
    let mut header = Header {
        parent_hash: parent.hash(),
        number: parent.number + 1,
        gas_limit: parent.gas_limit,
        time: parent.time + 1,
        ..Header::default()
    };
    engine
        .prepare(chain, &mut header)
        .expect("parent is known to the chain");
    header
}
