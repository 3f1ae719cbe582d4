//! In-memory test chain.
//!
//! `TestChain` implements [`ChainAdapter`] with just enough ledger behavior
//! for the scheduler to be exercised realistically:
//!
//! - blocks must strictly advance both number and timestamp
//! - one pending block at a time
//! - block gas accounting: a transaction is admitted only if its gas limit
//!   fits in what the block has left, and then consumes its intrinsic gas
//! - per-sender nonces and deterministic transaction hashes
//!
//! Contract code is not interpreted; every admitted transaction succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use seqfuzz_types::{Address, Hash32};

use super::{Block, BlockHeader, BlockRef, BlockTransaction, ChainAdapter, Receipt};
use crate::calls::CallMessage;
use crate::config::EngineConfig;
use crate::errors::ChainError;
use crate::tracer::{TransactionContext, TransactionTracer};

/// Base cost of every transaction.
pub const TX_GAS: u64 = 21_000;
/// Extra base cost of contract creation.
pub const TX_CREATE_GAS: u64 = 32_000;
pub const TX_DATA_ZERO_GAS: u64 = 4;
pub const TX_DATA_NON_ZERO_GAS: u64 = 16;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Gas charged for a transaction before any code runs.
pub fn intrinsic_gas(input: &[u8], is_creation: bool) -> u64 {
    let zeros = input.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = input.len() as u64 - zeros;
    let base = if is_creation {
        TX_GAS + TX_CREATE_GAS
    } else {
        TX_GAS
    };
    base + zeros * TX_DATA_ZERO_GAS + non_zeros * TX_DATA_NON_ZERO_GAS
}

/// Where a committed transaction lives.
#[derive(Debug, Clone, Copy)]
struct TxLocation {
    block_index: usize,
    tx_index: usize,
}

pub struct TestChain {
    instance_id: u64,
    block_gas_limit: u64,
    /// Committed blocks; index 0 is genesis.
    blocks: Vec<Block>,
    pending: Option<Block>,
    nonces: HashMap<Address, u64>,
    /// Nonces as they were when the pending block was opened.
    pending_nonces_snapshot: Option<HashMap<Address, u64>>,
    tx_locations: HashMap<Hash32, TxLocation>,
}

impl TestChain {
    pub fn new(config: &EngineConfig) -> Self {
        let mut genesis = Block {
            header: BlockHeader {
                number: config.genesis_number,
                timestamp: config.genesis_timestamp,
                gas_limit: config.block_gas_limit,
                gas_used: 0,
                parent_hash: Hash32::ZERO,
                extra: Vec::new(),
            },
            hash: None,
            transactions: Vec::new(),
        };
        genesis.hash = Some(block_hash(&genesis));

        Self {
            instance_id: next_instance_id(),
            block_gas_limit: config.block_gas_limit,
            blocks: vec![genesis],
            pending: None,
            nonces: HashMap::new(),
            pending_nonces_snapshot: None,
            tx_locations: HashMap::new(),
        }
    }

    /// An independent copy of this chain with a fresh instance id.
    pub fn fork(&self) -> Self {
        Self {
            instance_id: next_instance_id(),
            block_gas_limit: self.block_gas_limit,
            blocks: self.blocks.clone(),
            pending: self.pending.clone(),
            nonces: self.nonces.clone(),
            pending_nonces_snapshot: self.pending_nonces_snapshot.clone(),
            tx_locations: self.tx_locations.clone(),
        }
    }

    pub fn block_gas_limit(&self) -> u64 {
        self.block_gas_limit
    }

    /// Committed blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, number: u64) -> Option<&Block> {
        self.blocks.iter().find(|b| b.header.number == number)
    }

    /// A committed transaction by hash.
    pub fn transaction(&self, hash: &Hash32) -> Option<&BlockTransaction> {
        let location = self.tx_locations.get(hash)?;
        self.blocks
            .get(location.block_index)?
            .transactions
            .get(location.tx_index)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    /// Drop the pending block and restore sender nonces.
    pub fn discard_pending_block(&mut self) -> Option<Block> {
        let discarded = self.pending.take()?;
        if let Some(snapshot) = self.pending_nonces_snapshot.take() {
            self.nonces = snapshot;
        }
        tracing::debug!(
            chain = self.instance_id,
            number = discarded.header.number,
            txs = discarded.transactions.len(),
            "discarded pending block"
        );
        Some(discarded)
    }
}

fn transaction_hash(message: &CallMessage, nonce: u64) -> Hash32 {
    let mut bytes = message.to_bytes();
    bytes.extend_from_slice(&nonce.to_be_bytes());
    Hash32::digest(&bytes)
}

fn created_address(sender: &Address, nonce: u64) -> Address {
    let mut bytes = sender.as_bytes().to_vec();
    bytes.extend_from_slice(&nonce.to_be_bytes());
    Address::from_digest_tail(Hash32::digest(&bytes).as_bytes())
}

fn block_hash(block: &Block) -> Hash32 {
    let header = &block.header;
    let mut bytes = Vec::with_capacity(32 + 32 + block.transactions.len() * 32);
    bytes.extend_from_slice(header.parent_hash.as_bytes());
    bytes.extend_from_slice(&header.number.to_be_bytes());
    bytes.extend_from_slice(&header.timestamp.to_be_bytes());
    bytes.extend_from_slice(&header.gas_limit.to_be_bytes());
    bytes.extend_from_slice(&header.gas_used.to_be_bytes());
    bytes.extend_from_slice(&header.extra);
    for tx in &block.transactions {
        bytes.extend_from_slice(tx.hash.as_bytes());
    }
    Hash32::digest(&bytes)
}

impl ChainAdapter for TestChain {
    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn head(&self) -> &Block {
        // Genesis is created in `new` and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    fn pending_block(&self) -> Option<&Block> {
        self.pending.as_ref()
    }

    fn create_pending_block(
        &mut self,
        number: u64,
        timestamp: u64,
        extra: Option<&[u8]>,
    ) -> Result<BlockRef, ChainError> {
        if let Some(pending) = &self.pending {
            return Err(ChainError::PendingBlockExists {
                number: pending.header.number,
            });
        }
        let head = self.head();
        if number <= head.header.number || timestamp <= head.header.timestamp {
            return Err(ChainError::InvalidBlockParameters {
                number,
                timestamp,
                head_number: head.header.number,
                head_timestamp: head.header.timestamp,
            });
        }

        let block = Block {
            header: BlockHeader {
                number,
                timestamp,
                gas_limit: self.block_gas_limit,
                gas_used: 0,
                parent_hash: head.hash.unwrap_or(Hash32::ZERO),
                extra: extra.map(|e| e.to_vec()).unwrap_or_default(),
            },
            hash: None,
            transactions: Vec::new(),
        };
        let block_ref = block.block_ref();
        tracing::debug!(
            chain = self.instance_id,
            number,
            timestamp,
            "created pending block"
        );
        self.pending_nonces_snapshot = Some(self.nonces.clone());
        self.pending = Some(block);
        Ok(block_ref)
    }

    fn add_transaction(
        &mut self,
        message: &CallMessage,
        tracers: &[Arc<dyn TransactionTracer>],
    ) -> Result<(), ChainError> {
        let pending = self.pending.as_mut().ok_or(ChainError::NoPendingBlock)?;

        let input = message.input();
        let intrinsic = intrinsic_gas(&input, message.is_creation());
        if message.gas_limit < intrinsic {
            return Err(ChainError::IntrinsicGasTooLow {
                gas_limit: message.gas_limit,
                intrinsic,
            });
        }

        let available = pending.remaining_gas();
        if message.gas_limit > available {
            return Err(ChainError::BlockGasLimitReached {
                required: message.gas_limit,
                available,
                block_number: pending.header.number,
            });
        }

        let nonce = self.nonces.get(&message.from).copied().unwrap_or(0);
        let hash = transaction_hash(message, nonce);
        let context = TransactionContext {
            hash,
            message,
            block_number: pending.header.number,
            block_timestamp: pending.header.timestamp,
            transaction_index: pending.transactions.len(),
        };
        for tracer in tracers {
            tracer.on_transaction_start(&context);
        }

        let gas_used = intrinsic;
        pending.header.gas_used += gas_used;
        let receipt = Receipt {
            gas_used,
            cumulative_gas_used: pending.header.gas_used,
            contract_address: message
                .is_creation()
                .then(|| created_address(&message.from, nonce)),
        };
        for tracer in tracers {
            tracer.on_transaction_end(&context, &receipt);
        }

        tracing::trace!(
            chain = self.instance_id,
            block = pending.header.number,
            index = pending.transactions.len(),
            tx = %hash.short(),
            gas_used,
            "added transaction"
        );
        pending.transactions.push(BlockTransaction {
            hash,
            nonce,
            message: message.clone(),
            receipt,
        });
        self.nonces.insert(message.from, nonce + 1);
        Ok(())
    }

    fn commit_pending_block(&mut self) -> Result<BlockRef, ChainError> {
        let mut block = self.pending.take().ok_or(ChainError::NoPendingBlock)?;
        self.pending_nonces_snapshot = None;

        let hash = block_hash(&block);
        block.hash = Some(hash);
        let block_index = self.blocks.len();
        for (tx_index, tx) in block.transactions.iter().enumerate() {
            self.tx_locations.insert(
                tx.hash,
                TxLocation {
                    block_index,
                    tx_index,
                },
            );
        }
        tracing::debug!(
            chain = self.instance_id,
            number = block.header.number,
            timestamp = block.header.timestamp,
            txs = block.transactions.len(),
            gas_used = block.header.gas_used,
            "committed block"
        );
        let block_ref = block.block_ref();
        self.blocks.push(block);
        Ok(block_ref)
    }
}
