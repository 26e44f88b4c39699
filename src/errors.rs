use std::io;

use alloy_primitives::{B256, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown ancestor")]
    UnknownAncestor,
    #[error("missing block state")]
    MissingState,
    #[error("DoS throttle")]
    DoSThrottle,
    #[error("invalid consensus transaction")]
    InvalidConsensusTx,
    #[error("invalid block number")]
    InvalidNumber,
    #[error("Signature is missing")]
    MissingSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("invalid signature values")]
    InvalidSignatureValues,
    #[error("Blacklisted coinbase")]
    BlacklistedCoinbase,
    #[error("Invalid Migration")]
    InvalidMigration,
    #[error("uncles not allowed")]
    UnclesNotAllowed,
    #[error("extra-data too long: {have} > {max}")]
    ExtraTooLong { have: usize, max: usize },
    #[error("invalid modifier: have {have}, want {want}")]
    InvalidModifier { have: B256, want: B256 },
    #[error("invalid difficulty: have {have}, want {want}")]
    InvalidDifficulty { have: U256, want: U256 },
    #[error("invalid proof-of-stake hash")]
    InvalidPoSHash,
    #[error("timestamp too early: have {have}, minimum {min}")]
    TimestampTooEarly { have: u64, min: u64 },
    #[error("timestamp too far in future: have {have}, maximum {max}")]
    TimestampTooFar { have: u64, max: u64 },
    #[error("invalid gasLimit: have {have}, max {max}")]
    GasLimitTooHigh { have: u64, max: u64 },
    #[error("invalid gasUsed: have {have}, gasLimit {limit}")]
    GasUsedExceedsLimit { have: u64, limit: u64 },
    #[error("invalid gas limit: have {have}, want {parent} += {bound}")]
    GasLimitOutOfBounds { have: u64, parent: u64, bound: u64 },
    #[error("invalid gas limit: have {have}, minimum {min}")]
    GasLimitTooLow { have: u64, min: u64 },
    #[error("invalid fork hash at block {number}: have {have}, want {want}")]
    ForkHashMismatch { number: u64, have: B256, want: B256 },
    #[error("gas pool exhausted: requested {requested}, remaining {remaining}")]
    GasPoolExhausted { requested: u64, remaining: u64 },
    #[error("abi error: {0}")]
    Abi(String),
    #[error("evm error: {0}")]
    Evm(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
