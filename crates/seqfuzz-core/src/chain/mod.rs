//! Chain adapter interface.
//!
//! The execution engine never interprets transactions itself. It drives a
//! [`ChainAdapter`], which owns the ledger: a committed head block and at most
//! one pending block under construction.
//!
//! - [`ChainAdapter`]: the capability set the scheduler consumes
//! - [`TestChain`]: in-memory adapter with block gas accounting
//! - [`Block`], [`BlockHeader`], [`BlockTransaction`], [`Receipt`]: chain data

use std::sync::Arc;

use seqfuzz_types::{Address, Hash32};
use serde::{Deserialize, Serialize};

use crate::calls::CallMessage;
use crate::errors::ChainError;
use crate::tracer::TransactionTracer;

pub mod test_chain;

pub use test_chain::{intrinsic_gas, TestChain};

/// Block header fields the engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    /// Seconds.
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub parent_hash: Hash32,
    #[serde(default, with = "seqfuzz_types::encoding::hex_bytes")]
    pub extra: Vec<u8>,
}

/// Result of executing one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub gas_used: u64,
    /// Gas used by this and all earlier transactions in the block.
    pub cumulative_gas_used: u64,
    /// Address of the deployed contract for creation calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
}

/// A transaction included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub hash: Hash32,
    pub nonce: u64,
    pub message: CallMessage,
    pub receipt: Receipt,
}

/// A block. `hash` is `None` while the block is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub hash: Option<Hash32>,
    pub transactions: Vec<BlockTransaction>,
}

impl Block {
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            number: self.header.number,
            timestamp: self.header.timestamp,
            hash: self.hash,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.hash.is_some()
    }

    /// Gas still available for new transactions.
    pub fn remaining_gas(&self) -> u64 {
        self.header.gas_limit.saturating_sub(self.header.gas_used)
    }
}

/// Lightweight block identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    pub timestamp: u64,
    pub hash: Option<Hash32>,
}

/// The chain operations the scheduler needs.
///
/// Implementations own the pending-block state; callers must hold `&mut`
/// access for the whole of a sequence execution.
pub trait ChainAdapter {
    /// Identifier unique to this chain instance (forks get a new one).
    fn instance_id(&self) -> u64;

    /// The latest committed block.
    fn head(&self) -> &Block;

    /// The open, uncommitted block, if any.
    fn pending_block(&self) -> Option<&Block>;

    /// Open a new pending block at the given number and timestamp.
    fn create_pending_block(
        &mut self,
        number: u64,
        timestamp: u64,
        extra: Option<&[u8]>,
    ) -> Result<BlockRef, ChainError>;

    /// Execute `message` into the pending block.
    ///
    /// Fails with [`ChainError::BlockGasLimitReached`] when the block lacks
    /// the capacity for it; other failures use the remaining variants.
    fn add_transaction(
        &mut self,
        message: &CallMessage,
        tracers: &[Arc<dyn TransactionTracer>],
    ) -> Result<(), ChainError>;

    /// Seal the pending block onto the chain.
    fn commit_pending_block(&mut self) -> Result<BlockRef, ChainError>;
}
