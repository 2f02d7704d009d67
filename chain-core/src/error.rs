//! Error types for the **chain-core** engine.
//!
//! Each concern gets one flat `thiserror` enum rather than a hierarchy of
//! error types, so callers can match on a tag instead of downcasting. The
//! kinds line up with the taxonomy of malformed input, validation failure,
//! conflict, transient infrastructure, equivocation, and programming
//! invariant violations.

use thiserror::Error;

/// Errors raised while interpreting a script.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum VmError {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("bad numeric encoding")]
    BadNumericEncoding,
    #[error("unknown opcode {0:#04x} at strict version")]
    UnknownOpcode(u8),
    #[error("run limit exceeded")]
    RunLimitExceeded,
    #[error("division by zero")]
    DivisionByZero,
    #[error("reserved opcode {0:#04x} used in strict context")]
    ReservedOpcode(u8),
    #[error("nested predicate depth exceeded")]
    NestedDepthExceeded,
    #[error("introspection opcode used outside transaction context")]
    NoTxContext,
    #[error("block-sighash opcode used outside block context")]
    NoBlockContext,
    #[error("program did not leave a true value on top of stack")]
    FalseResult,
    #[error("program exited with non-zero code")]
    NonZeroExit,
    #[error("unsupported hash type {0:#x}")]
    UnsupportedHashType(u8),
}

/// Errors raised by the Patricia trie.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TrieError {
    #[error("key {key} already present with a different value hash")]
    ConflictingValue { key: crate::hash::Hash },
    #[error("key {key} not present")]
    KeyNotFound { key: crate::hash::Hash },
}

/// Errors raised by stateless and contextual transaction/block validation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("maxTime is nonzero and less than minTime")]
    TimeRangeInverted,
    #[error("inputs and outputs do not balance for an asset id")]
    Unbalanced,
    #[error("duplicate source outpoint")]
    DuplicateOutpoint,
    #[error("input witness program failed: {0}")]
    WitnessFailed(#[from] VmError),
    #[error("unknown transaction version under strict policy")]
    UnknownTxVersion,
    #[error("block time {block_time_ms} outside transaction window [{min_time_ms}, {max_time_ms}]")]
    OutsideTimeWindow {
        block_time_ms: u64,
        min_time_ms: u64,
        max_time_ms: u64,
    },
    #[error("spent outpoint not present in trie")]
    MissingOutput,
    #[error("issuance input already recorded in issuance memo")]
    IssuanceReplay,
    #[error("issuance window exceeds configured maximum")]
    IssuanceWindowTooWide,
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),
    #[error("block height is not exactly previous height + 1")]
    NonSequentialHeight,
    #[error("previousBlockHash does not match hash of previous header")]
    PrevHashMismatch,
    #[error("block timestamp does not strictly increase")]
    NonIncreasingTimestamp,
    #[error("consensus program changed between blocks")]
    ConsensusProgramChanged,
    #[error("transactionsRoot does not match recomputed root")]
    TransactionsRootMismatch,
    #[error("assetsRoot does not match snapshot root after applying block")]
    AssetsRootMismatch,
}

/// Errors surfaced by the pool.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("transaction validation failed: {0}")]
    Invalid(#[from] ValidationError),
}

/// Errors surfaced by the chain controller.
#[derive(Debug, Error, Clone)]
pub enum ChainError {
    #[error("transaction malformed or failed stateless validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("transaction maxTime has already passed")]
    Expired,
    #[error("transaction conflicts with current chain state")]
    Conflict,
    #[error("block validation failed: {0}")]
    BlockInvalid(ValidationError),
    #[error("store error: {0}")]
    Store(String),
    #[error("timed out waiting for block height {0}")]
    WaitTimedOut(u64),
    #[error("requested height is too far in the future (> current + {window})")]
    DistantFuture { window: u64 },
    #[error("wait was cancelled")]
    Cancelled,
    #[error("programming invariant violated: {0}")]
    Invariant(String),
}

/// Errors surfaced by block-signer equivocation protection and signing.
#[derive(Debug, Error, Clone)]
pub enum SignerError {
    #[error("already signed a different block at height {height}")]
    Equivocation { height: u64 },
    #[error("local height {local} has not caught up to block.height - 1 ({required})")]
    NotCaughtUp { local: u64, required: u64 },
    #[error("consensus program change is forbidden by current policy")]
    ConsensusProgramChangeForbidden,
    #[error("block failed validation: {0}")]
    Invalid(#[from] ValidationError),
    #[error("store error: {0}")]
    Store(String),
}

/// Errors surfaced by the generator's signer-coordination tick.
#[derive(Debug, Error, Clone)]
pub enum GeneratorError {
    #[error("quorum of {required} signatures not reached before deadline ({collected} collected)")]
    QuorumNotReached { required: usize, collected: usize },
    #[error("witness failed to satisfy consensus program under BLOCKSIGHASH")]
    WitnessInvalid,
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("local signer failed: {0}")]
    LocalSignerFailed(#[from] SignerError),
    #[error("remote signer call failed: {0}")]
    RemoteSignerFailed(String),
}

pub type VmResult<T> = core::result::Result<T, VmError>;
pub type TrieResult<T> = core::result::Result<T, TrieError>;
pub type ValidationResult<T> = core::result::Result<T, ValidationError>;
pub type PoolResult<T> = core::result::Result<T, PoolError>;
pub type ChainResult<T> = core::result::Result<T, ChainError>;
pub type SignerResult<T> = core::result::Result<T, SignerError>;
pub type GeneratorResult<T> = core::result::Result<T, GeneratorError>;
