mod api;
mod difficulty;
mod dos;
mod evm;
mod finalize;
mod masternode;
mod mining;
mod seal;
mod timing;

pub use api::{EngineApi, MiningStatus, RpcApi};
pub use mining::SealResult;
pub use timing::TimeTarget;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy_json_abi::JsonAbi;
use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, U256};
use alloy_rlp::RlpEncodable;
use crossbeam_channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::abi;
use crate::chain::ChainReader;
use crate::config::ChainConfig;
use crate::errors::{EngineError, EngineResult};
use crate::params::{GAS_LIMIT_CAP, MIGRATION_CONTRACT, SYSTEM_FAUCET, UNLIMITED_GAS};
use crate::storage::Storage;
use crate::types::{Block, Header};

use dos::{StakeKey, StakeSeen};

pub type AccountsFn = Box<dyn Fn() -> Vec<Address> + Send + Sync>;
pub type SignerFn = Box<dyn Fn(Address, &[u8]) -> EngineResult<Vec<u8>> + Send + Sync>;
pub type PeerCountFn = Box<dyn Fn() -> usize + Send + Sync>;
pub type IsMiningFn = Box<dyn Fn() -> bool + Send + Sync>;
pub type ClockFn = Box<dyn Fn() -> u64 + Send + Sync>;

pub struct MinerCallbacks {
    pub accounts: AccountsFn,
    pub signer: SignerFn,
    pub peer_count: PeerCountFn,
    pub is_mining: IsMiningFn,
}

const TXHASH_CACHE_CAPACITY: usize = 8;

/// The PoS consensus engine. One instance lives for the process and is shared
/// across the importer, the miner and RPC; cloning shares that instance.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) config: ChainConfig,
    pub(crate) db: Storage,
    pub(crate) reward_abi: JsonAbi,
    pub(crate) dpos_abi: JsonAbi,
    pub(crate) blacklist_abi: JsonAbi,
    pub(crate) spork_abi: JsonAbi,
    pub(crate) mnreg_abi: JsonAbi,
    pub(crate) treasury_abi: JsonAbi,
    pub(crate) system_faucet: Address,
    pub(crate) call_gas: AtomicU64,
    pub(crate) xfer_gas: AtomicU64,
    pub(crate) unlimited_gas: u64,
    pub(crate) nonce_cap: AtomicU64,
    pub(crate) callbacks: OnceCell<MinerCallbacks>,
    pub(crate) now: ClockFn,
    pub(crate) known_stakes: DashMap<StakeKey, StakeSeen>,
    pub(crate) next_ks_purge: AtomicU64,
    pub(crate) txhash_map: Mutex<LruCache<B256, B256>>,
}

#[derive(RlpEncodable)]
struct SealContent {
    parent_hash: B256,
    uncle_hash: B256,
    tx_hash: B256,
    number: u64,
    gas_limit: u64,
}

#[derive(RlpEncodable)]
struct SignatureContent {
    parent_hash: B256,
    uncle_hash: B256,
    coinbase: Address,
    root: B256,
    tx_hash: B256,
    receipt_hash: B256,
    bloom: Bloom,
    difficulty: U256,
    number: u64,
    gas_limit: u64,
    gas_used: u64,
    time: u64,
    extra: Bytes,
    mix_digest: B256,
    nonce: u64,
}

impl Engine {
    pub fn new(config: ChainConfig, db: Storage) -> Self {
        Self::with_clock(
            config,
            db,
            Box::new(|| {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            }),
        )
    }

    /// Constructor with an injectable clock so tests can drive wall time.
    pub fn with_clock(config: ChainConfig, db: Storage, now: ClockFn) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                db,
                reward_abi: abi::parse_abi(abi::BLOCK_REWARD_ABI),
                dpos_abi: abi::parse_abi(abi::DELEGATED_POS_ABI),
                blacklist_abi: abi::parse_abi(abi::BLACKLIST_REGISTRY_ABI),
                spork_abi: abi::parse_abi(abi::SPORK_REGISTRY_ABI),
                mnreg_abi: abi::parse_abi(abi::MASTERNODE_REGISTRY_ABI),
                treasury_abi: abi::parse_abi(abi::TREASURY_ABI),
                system_faucet: SYSTEM_FAUCET,
                call_gas: AtomicU64::new(30_000),
                xfer_gas: AtomicU64::new(0),
                unlimited_gas: UNLIMITED_GAS,
                nonce_cap: AtomicU64::new(0),
                callbacks: OnceCell::new(),
                now,
                known_stakes: DashMap::new(),
                next_ks_purge: AtomicU64::new(0),
                txhash_map: Mutex::new(LruCache::new(
                    NonZeroUsize::new(TXHASH_CACHE_CAPACITY).expect("non-zero cache capacity"),
                )),
            }),
        }
    }

    /// PoS recovers the proposer from the seal, so the plain author is always
    /// the zero address; use `verify_seal` for recovery.
    pub fn author(&self, _header: &Header) -> Address {
        Address::ZERO
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.db
    }

    pub fn config(&self) -> &ChainConfig {
        &self.inner.config
    }

    /// Checks a header against the consensus rules. With `seal` set the
    /// signature, the hash-of-stake and the DoS rules are checked as well.
    pub fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        seal: bool,
    ) -> EngineResult<()> {
        let config = chain.config();
        let is_migration = header.is_migration();

        if header.extra.len() > config.maximum_extra_data_size && !is_migration {
            return Err(EngineError::ExtraTooLong {
                have: header.extra.len(),
                max: config.maximum_extra_data_size,
            });
        }

        if is_migration && header.coinbase != MIGRATION_CONTRACT {
            error!(
                signer = %header.coinbase,
                required = %MIGRATION_CONTRACT,
                "PoS migration mismatch"
            );
            return Err(EngineError::InvalidMigration);
        }

        let parent = if header.number == 0 {
            None
        } else {
            chain.get_header(&header.parent_hash, header.number - 1)
        };
        let parent = match parent {
            Some(parent) => parent,
            None => {
                if header.number != 0 {
                    trace!(
                        number = header.number,
                        hash = %header.hash(),
                        parent = %header.parent_hash,
                        "parent not found"
                    );
                    return Err(EngineError::UnknownAncestor);
                }
                return Ok(());
            }
        };

        let time_target = self.calc_time_target(chain, &parent);
        self.check_time(header, &time_target)?;

        let modifier = self.calc_pos_modifier(header.time, &parent);
        if header.mix_digest != modifier {
            return Err(EngineError::InvalidModifier {
                have: header.mix_digest,
                want: modifier,
            });
        }

        let difficulty = self.calc_pos_difficulty(chain, header.time, &parent, &time_target);
        if header.difficulty != difficulty {
            return Err(EngineError::InvalidDifficulty {
                have: header.difficulty,
                want: difficulty,
            });
        }

        if header.gas_limit > GAS_LIMIT_CAP {
            return Err(EngineError::GasLimitTooHigh {
                have: header.gas_limit,
                max: GAS_LIMIT_CAP,
            });
        }

        if header.gas_used > header.gas_limit && !is_migration {
            return Err(EngineError::GasUsedExceedsLimit {
                have: header.gas_used,
                limit: header.gas_limit,
            });
        }

        let bound = parent.gas_limit / config.gas_limit_bound_divisor;
        let diff = parent.gas_limit.abs_diff(header.gas_limit);
        if diff >= bound && !is_migration && !parent.is_migration() {
            return Err(EngineError::GasLimitOutOfBounds {
                have: header.gas_limit,
                parent: parent.gas_limit,
                bound,
            });
        }

        if header.gas_limit < config.min_gas_limit {
            return Err(EngineError::GasLimitTooLow {
                have: header.gas_limit,
                min: config.min_gas_limit,
            });
        }

        if header.number != parent.number + 1 {
            return Err(EngineError::InvalidNumber);
        }

        // Seal checks need the full parent maturity state, so they are
        // skipped when the caller only wants the static rules.
        if seal {
            self.verify_seal(chain, header)?;
            self.verify_pos_hash(chain, header)?;
        }

        self.verify_fork_hashes(config, header)?;

        if seal && chain.get_header(&header.hash(), header.number).is_none() {
            self.check_dos(chain, header, &parent)?;
        }

        Ok(())
    }

    /// Batch verification. Returns an abort sender, a results receiver that
    /// yields one value per header in input order, and a ready sender the
    /// caller feeds one token per header it wants processed.
    pub fn verify_headers(
        &self,
        chain: Arc<dyn ChainReader>,
        headers: Vec<Header>,
        seals: Vec<bool>,
    ) -> (Sender<()>, Receiver<EngineResult<()>>, Sender<bool>) {
        let capacity = headers.len().max(1);
        let (abort_tx, abort_rx) = bounded::<()>(1);
        let (results_tx, results_rx) = bounded::<EngineResult<()>>(capacity);
        let (ready_tx, ready_rx) = bounded::<bool>(capacity);

        let engine = self.clone();
        thread::spawn(move || {
            // Unlike a DAG-backed engine there is nothing to precompute per
            // header, so the batch is processed sequentially.
            for (header, seal) in headers.into_iter().zip(seals.into_iter()) {
                crossbeam_channel::select! {
                    recv(abort_rx) -> _ => return,
                    recv(ready_rx) -> token => {
                        if token.is_err() {
                            return;
                        }
                    }
                }

                let result = engine.verify_header(chain.as_ref(), &header, seal);

                crossbeam_channel::select! {
                    recv(abort_rx) -> _ => return,
                    send(results_tx, result) -> sent => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        (abort_tx, results_rx, ready_tx)
    }

    pub fn verify_uncles(&self, _chain: &dyn ChainReader, block: &Block) -> EngineResult<()> {
        if !block.uncles().is_empty() {
            return Err(EngineError::UnclesNotAllowed);
        }
        Ok(())
    }

    /// Initialises the consensus fields of a header under preparation.
    pub fn prepare(&self, chain: &dyn ChainReader, header: &mut Header) -> EngineResult<()> {
        let parent = chain
            .get_header(&header.parent_hash, header.number.saturating_sub(1))
            .ok_or_else(|| {
                error!(number = header.number, parent = %header.parent_hash, "parent not found");
                EngineError::UnknownAncestor
            })?;
        self.pos_prepare(chain, header, &parent).map(|_| ())
    }

    pub(crate) fn pos_prepare(
        &self,
        chain: &dyn ChainReader,
        header: &mut Header,
        parent: &Header,
    ) -> EngineResult<TimeTarget> {
        // Coinbase and nonce are decided by the mining search.
        header.coinbase = Address::ZERO;
        header.nonce = 0;

        let time_target = self.calc_time_target(chain, parent);
        self.enforce_time(header, &time_target);

        header.mix_digest = self.calc_pos_modifier(header.time, parent);
        header.difficulty = self.calc_pos_difficulty(chain, header.time, parent, &time_target);

        Ok(time_target)
    }

    /// Identifies an unsealed work item. When finalisation replaced the
    /// transactions root, the pre-seal root recorded at sealing time is used
    /// so miners recognise their own submissions.
    pub fn seal_hash(&self, header: &Header) -> B256 {
        let mut tx_hash = header.tx_hash;
        if let Some(original) = self.inner.txhash_map.lock().get(&tx_hash) {
            tx_hash = *original;
        }
        keccak256(alloy_rlp::encode(&SealContent {
            parent_hash: header.parent_hash,
            uncle_hash: header.uncle_hash,
            tx_hash,
            number: header.number,
            gas_limit: header.gas_limit,
        }))
    }

    /// The digest the coinbase key signs: every header field but the
    /// signature itself.
    pub fn signature_hash(&self, header: &Header) -> B256 {
        keccak256(alloy_rlp::encode(&SignatureContent {
            parent_hash: header.parent_hash,
            uncle_hash: header.uncle_hash,
            coinbase: header.coinbase,
            root: header.root,
            tx_hash: header.tx_hash,
            receipt_hash: header.receipt_hash,
            bloom: header.bloom,
            difficulty: header.difficulty,
            number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            time: header.time,
            extra: header.extra.clone(),
            mix_digest: header.mix_digest,
            nonce: header.nonce,
        }))
    }

    pub fn calc_difficulty(&self, chain: &dyn ChainReader, time: u64, parent: &Header) -> U256 {
        let time_target = self.calc_time_target(chain, parent);
        self.calc_pos_difficulty(chain, time, parent, &time_target)
    }

    pub fn close(&self) -> EngineResult<()> {
        Ok(())
    }

    pub fn set_miner_nonce_cap(&self, nonce_cap: u64) {
        self.inner.nonce_cap.store(nonce_cap, Ordering::SeqCst);
    }

    pub fn get_miner_nonce_cap(&self) -> u64 {
        self.inner.nonce_cap.load(Ordering::SeqCst)
    }

    /// Wires the miner callbacks. Must be called exactly once; a second call
    /// is a programming error.
    pub fn set_miner_callbacks(&self, callbacks: MinerCallbacks) {
        if self.inner.callbacks.set(callbacks).is_err() {
            panic!("miner callbacks must be set only once");
        }
    }

    pub(crate) fn callbacks(&self) -> Option<&MinerCallbacks> {
        self.inner.callbacks.get()
    }

    pub(crate) fn now(&self) -> u64 {
        (self.inner.now)()
    }

    pub(crate) fn call_gas(&self) -> u64 {
        self.inner.call_gas.load(Ordering::Relaxed)
    }

    pub(crate) fn xfer_gas(&self) -> u64 {
        self.inner.xfer_gas.load(Ordering::Relaxed)
    }

    pub(crate) fn remember_txhash(&self, sealed: B256, original: B256) {
        self.inner.txhash_map.lock().put(sealed, original);
    }

    fn verify_fork_hashes(&self, config: &ChainConfig, header: &Header) -> EngineResult<()> {
        if let Some(want) = config.fork_hash(header.number) {
            let have = header.hash();
            if have != want {
                return Err(EngineError::ForkHashMismatch {
                    number: header.number,
                    have,
                    want,
                });
            }
        }
        Ok(())
    }
}
