//! Transaction tracing.
//!
//! A [`TransactionTracer`] is handed to
//! [`ChainAdapter::add_transaction`](crate::chain::ChainAdapter::add_transaction)
//! and observes each transaction as it executes. [`ExecutionTracer`] is the
//! tracer the engine uses to build an [`ExecutionTrace`] per transaction,
//! resolving contract and method names from the known [`Contracts`].
//!
//! Traces are stored by transaction hash and attached to sequence elements
//! after a run completes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use seqfuzz_types::encoding::{hex_bytes, to_hex_prefixed};
use seqfuzz_types::{Address, Hash32};
use serde::{Deserialize, Serialize};

use crate::calls::CallMessage;
use crate::chain::Receipt;
use crate::contracts::Contracts;

/// What a tracer sees about a transaction being executed.
#[derive(Debug, Clone, Copy)]
pub struct TransactionContext<'a> {
    pub hash: Hash32,
    pub message: &'a CallMessage,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_index: usize,
}

/// Observer of transaction execution.
pub trait TransactionTracer: Send + Sync {
    fn on_transaction_start(&self, _context: &TransactionContext<'_>) {}

    fn on_transaction_end(&self, context: &TransactionContext<'_>, receipt: &Receipt);
}

/// Structured record of a single transaction's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub transaction_hash: Hash32,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_index: usize,
    pub from: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Contract the called method belongs to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    /// Method signature, when the input could be decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    pub gas_limit: u64,
    pub gas_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_address: Option<Address>,
}

impl fmt::Display for ExecutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[block {}, tx {}] {}",
            self.block_number, self.transaction_index, self.transaction_hash
        )?;
        let target = match (&self.to, &self.created_address) {
            (Some(to), _) => to.to_short_string(),
            (None, Some(created)) => format!("<create {}>", created.to_short_string()),
            (None, None) => "<create>".to_string(),
        };
        write!(f, "  {} -> {}", self.from.to_short_string(), target)?;
        match (&self.contract_name, &self.method) {
            (Some(contract), Some(method)) => write!(f, " {}.{}", contract, method)?,
            (None, Some(method)) => write!(f, " {}", method)?,
            _ if !self.input.is_empty() => write!(f, " data={}", to_hex_prefixed(&self.input))?,
            _ => {}
        }
        if self.value > 0 {
            write!(f, " value={}", self.value)?;
        }
        writeln!(f)?;
        write!(f, "  gas: {} / {}", self.gas_used, self.gas_limit)
    }
}

/// Records traces keyed by transaction hash.
struct TraceRecorder {
    contracts: Contracts,
    traces: Mutex<HashMap<Hash32, ExecutionTrace>>,
}

impl TraceRecorder {
    fn describe(&self, message: &CallMessage) -> (Option<String>, Option<String>) {
        let resolved = message
            .selector()
            .and_then(|selector| self.contracts.resolve_method(&selector));
        match (resolved, message.abi_method()) {
            (Some((contract, method)), _) => {
                (Some(contract.name.clone()), Some(method.signature()))
            }
            (None, Some(method)) => (None, Some(method.signature())),
            (None, None) => (None, None),
        }
    }
}

impl TransactionTracer for TraceRecorder {
    fn on_transaction_end(&self, context: &TransactionContext<'_>, receipt: &Receipt) {
        let message = context.message;
        let (contract_name, method) = self.describe(message);
        let trace = ExecutionTrace {
            transaction_hash: context.hash,
            block_number: context.block_number,
            block_timestamp: context.block_timestamp,
            transaction_index: context.transaction_index,
            from: message.from,
            to: message.to,
            contract_name,
            method,
            value: message.value,
            input: message.input(),
            gas_limit: message.gas_limit,
            gas_used: receipt.gas_used,
            created_address: receipt.contract_address,
        };
        self.traces.lock().insert(context.hash, trace);
    }
}

/// Captures an [`ExecutionTrace`] for every transaction it is attached to.
pub struct ExecutionTracer {
    recorder: Arc<TraceRecorder>,
}

impl ExecutionTracer {
    pub fn new(contracts: Contracts) -> Self {
        Self {
            recorder: Arc::new(TraceRecorder {
                contracts,
                traces: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The tracer handle to pass to the chain.
    pub fn native_tracer(&self) -> Arc<dyn TransactionTracer> {
        self.recorder.clone()
    }

    /// The trace recorded for `hash`, if any.
    pub fn trace(&self, hash: &Hash32) -> Option<ExecutionTrace> {
        self.recorder.traces.lock().get(hash).cloned()
    }

    pub fn trace_count(&self) -> usize {
        self.recorder.traces.lock().len()
    }

    pub fn clear(&self) {
        self.recorder.traces.lock().clear();
    }
}
