//! Error types for chain access and sequence execution.
//!
//! [`ChainError`] is what a [`ChainAdapter`](crate::chain::ChainAdapter)
//! reports. Its [`BlockGasLimitReached`](ChainError::BlockGasLimitReached)
//! variant is the capacity kind the scheduler splits blocks on; everything else
//! aborts execution.
//!
//! [`SequenceExecutionFailure`] pairs a [`SequenceExecutionError`] with the
//! part of the sequence that was executed before the failure, so callers can
//! still attribute coverage or reproduce the prefix.

use std::fmt;

use crate::calls::CallSequence;

/// Errors reported by a chain adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A pending block is already open; commit it before creating another.
    PendingBlockExists {
        /// Number of the open pending block
        number: u64,
    },

    /// An operation needed a pending block but none is open.
    NoPendingBlock,

    /// The requested block number/timestamp does not advance past the head.
    InvalidBlockParameters {
        number: u64,
        timestamp: u64,
        head_number: u64,
        head_timestamp: u64,
    },

    /// BLOCK_GAS_LIMIT: the pending block cannot fit the transaction's gas limit.
    BlockGasLimitReached {
        /// Gas limit of the rejected transaction
        required: u64,
        /// Gas still available in the pending block
        available: u64,
        /// Number of the pending block
        block_number: u64,
    },

    /// INTRINSIC_GAS: the gas limit does not cover the transaction's base cost.
    IntrinsicGasTooLow { gas_limit: u64, intrinsic: u64 },

    /// Any other execution failure.
    Execution { message: String },
}

impl ChainError {
    /// Whether this error means the block ran out of capacity, as opposed to
    /// the transaction itself being invalid.
    pub fn is_capacity(&self) -> bool {
        matches!(self, ChainError::BlockGasLimitReached { .. })
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::PendingBlockExists { number } => {
                write!(f, "pending block {} already exists", number)
            }
            ChainError::NoPendingBlock => write!(f, "no pending block is open"),
            ChainError::InvalidBlockParameters {
                number,
                timestamp,
                head_number,
                head_timestamp,
            } => write!(
                f,
                "invalid block parameters: block ({}, {}) does not advance past head ({}, {})",
                number, timestamp, head_number, head_timestamp
            ),
            ChainError::BlockGasLimitReached {
                required,
                available,
                block_number,
            } => write!(
                f,
                "BLOCK_GAS_LIMIT: transaction needs {} gas but block {} has {} remaining",
                required, block_number, available
            ),
            ChainError::IntrinsicGasTooLow {
                gas_limit,
                intrinsic,
            } => write!(
                f,
                "INTRINSIC_GAS: gas limit {} is below intrinsic cost {}",
                gas_limit, intrinsic
            ),
            ChainError::Execution { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ChainError {}

/// Errors raised while executing a call sequence.
///
/// `index` is always the index of the element being processed when the error
/// occurred (the value passed to the element source).
#[derive(Debug)]
pub enum SequenceExecutionError {
    /// The element source failed to produce the next element.
    ElementSource {
        index: usize,
        source: anyhow::Error,
    },

    /// The continuation check failed after an element executed.
    ContinuationCheck {
        index: usize,
        source: anyhow::Error,
    },

    /// Placing a contract's setup hook call failed.
    ///
    /// `source` is the error the placement itself produced, e.g.
    /// [`BlockCapacityExceeded`](Self::BlockCapacityExceeded) when the hook
    /// cannot fit an empty block. Match through the wrapper (or use
    /// [`is_capacity_exceeded`](Self::is_capacity_exceeded)) rather than on
    /// the outer variant alone.
    SetupHook {
        index: usize,
        contract: String,
        source: Box<SequenceExecutionError>,
    },

    /// The call could not fit even in an empty block.
    BlockCapacityExceeded { index: usize, source: ChainError },

    /// The chain adapter failed to create, fill or commit a block.
    Chain(ChainError),
}

impl SequenceExecutionError {
    /// The capacity failure at the bottom of this error, if any.
    pub fn is_capacity_exceeded(&self) -> bool {
        match self {
            SequenceExecutionError::BlockCapacityExceeded { .. } => true,
            SequenceExecutionError::SetupHook { source, .. } => source.is_capacity_exceeded(),
            _ => false,
        }
    }
}

impl fmt::Display for SequenceExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceExecutionError::ElementSource { index, source } => {
                write!(f, "failed to fetch call sequence element {}: {}", index, source)
            }
            SequenceExecutionError::ContinuationCheck { index, source } => write!(
                f,
                "execution check failed after element {}: {}",
                index, source
            ),
            SequenceExecutionError::SetupHook {
                index,
                contract,
                source,
            } => write!(
                f,
                "setup hook for contract {} (before element {}) failed: {}",
                contract, index, source
            ),
            SequenceExecutionError::BlockCapacityExceeded { index, source } => write!(
                f,
                "element {} cannot fit in an empty block: {}",
                index, source
            ),
            SequenceExecutionError::Chain(err) => write!(f, "chain error: {}", err),
        }
    }
}

impl std::error::Error for SequenceExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SequenceExecutionError::ElementSource { source, .. }
            | SequenceExecutionError::ContinuationCheck { source, .. } => Some(&**source),
            SequenceExecutionError::SetupHook { source, .. } => Some(&**source),
            SequenceExecutionError::BlockCapacityExceeded { source, .. } => Some(source),
            SequenceExecutionError::Chain(err) => Some(err),
        }
    }
}

impl From<ChainError> for SequenceExecutionError {
    fn from(err: ChainError) -> Self {
        SequenceExecutionError::Chain(err)
    }
}

/// A failed execution together with everything executed before the failure.
#[derive(Debug)]
pub struct SequenceExecutionFailure {
    /// Elements (including injected setup hook calls) placed before the error.
    pub executed: CallSequence,
    pub error: SequenceExecutionError,
}

impl SequenceExecutionFailure {
    pub fn new(executed: CallSequence, error: SequenceExecutionError) -> Self {
        Self { executed, error }
    }

    /// Split into the partial record and the error.
    pub fn into_parts(self) -> (CallSequence, SequenceExecutionError) {
        (self.executed, self.error)
    }
}

impl fmt::Display for SequenceExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} element(s) executed)",
            self.error,
            self.executed.len()
        )
    }
}

impl std::error::Error for SequenceExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// ABI encoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// A method signature could not be parsed.
    InvalidSignature { signature: String, reason: String },

    /// An unknown or malformed type name.
    InvalidType { name: String },

    /// Wrong number of arguments for the method.
    ArgumentCount {
        method: String,
        expected: usize,
        got: usize,
    },

    /// An argument does not match its declared type.
    ArgumentType {
        method: String,
        position: usize,
        expected: String,
    },
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiError::InvalidSignature { signature, reason } => {
                write!(f, "invalid method signature '{}': {}", signature, reason)
            }
            AbiError::InvalidType { name } => write!(f, "invalid ABI type '{}'", name),
            AbiError::ArgumentCount {
                method,
                expected,
                got,
            } => write!(
                f,
                "{} expects {} argument(s), got {}",
                method, expected, got
            ),
            AbiError::ArgumentType {
                method,
                position,
                expected,
            } => write!(
                f,
                "{} argument {} is not a valid {}",
                method, position, expected
            ),
        }
    }
}

impl std::error::Error for AbiError {}
