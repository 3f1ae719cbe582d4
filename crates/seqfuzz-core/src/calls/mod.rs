//! Calls, call sequences and the sequence scheduler.
//!
//! - [`message`]: call messages and ABI input encoding
//! - [`sequence`]: call sequence elements and executed records
//! - [`execution`]: placing sequences into blocks on a chain
//! - [`batch`]: running independent sequences on separate chains in parallel

pub mod batch;
pub mod execution;
pub mod message;
pub mod sequence;

pub use batch::{execute_independent, BatchResult, BatchRun};
pub use execution::{
    execute_call_sequence, execute_call_sequence_iteratively,
    execute_call_sequence_with_execution_tracer, ContinuationFn, ExecuteOptions,
};
pub use message::{
    AbiCallData, AbiMethod, AbiType, AbiValue, CallData, CallMessage, SELECTOR_SIZE, WORD_SIZE,
};
pub use sequence::{CallSequence, CallSequenceElement, ChainReference};
