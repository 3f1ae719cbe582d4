//! Seqfuzz Core
//!
//! Block-aware call sequence execution for coverage-guided contract fuzzing.
//!
//! A fuzzer generates call sequences; this crate places them onto a chain
//! block by block, honoring each call's block number and timestamp delays,
//! splitting across blocks when one runs out of gas capacity, and running
//! each contract's one-time setup hook before its first use.
//!
//! # Features
//!
//! - **Iterative execution**: pull elements from a generator one at a time
//! - **Setup hooks**: one-time initialization calls injected automatically
//! - **Block capacity handling**: full blocks are committed and the call retried
//! - **Execution tracing**: per-transaction traces attached to the executed record
//!
//! # Core Modules
//!
//! - [`calls`]: call messages, sequences and the scheduler
//! - [`chain`]: the [`ChainAdapter`](chain::ChainAdapter) interface and [`TestChain`](chain::TestChain)
//! - [`contracts`]: contract definitions and setup hooks
//! - [`tracer`]: transaction tracers and execution traces
//! - [`config`]: engine configuration
//! - [`errors`]: chain and sequence execution errors
//!
//! # Example
//!
//! ```ignore
//! use seqfuzz_core::calls::{execute_call_sequence, CallSequence};
//! use seqfuzz_core::chain::TestChain;
//! use seqfuzz_core::config::EngineConfig;
//!
//! let mut chain = TestChain::new(&EngineConfig::default());
//! let executed = execute_call_sequence(&mut chain, sequence)?;
//! for element in &executed {
//!     println!("{}", element);
//! }
//! ```

#![allow(clippy::result_large_err)]

pub mod calls;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod tracer;

pub use calls::{
    execute_call_sequence, execute_call_sequence_iteratively,
    execute_call_sequence_with_execution_tracer, CallMessage, CallSequence, CallSequenceElement,
    ExecuteOptions,
};
pub use chain::{ChainAdapter, TestChain};
pub use config::EngineConfig;
pub use contracts::{ContractDefinition, ContractSetupHook, Contracts};
pub use errors::{ChainError, SequenceExecutionError, SequenceExecutionFailure};
pub use tracer::{ExecutionTrace, ExecutionTracer, TransactionTracer};
