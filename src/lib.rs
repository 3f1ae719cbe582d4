//! Seqfuzz
//!
//! Reproducer files and tooling around the call sequence execution engine:
//!
//! - **Contracts manifest**: describe contracts, methods and setup hooks as JSON
//! - **Reproducer files**: a failing call sequence plus everything needed to replay it
//!
//! The engine itself lives in [`seqfuzz_core`]; see [`sequence_file`] for the
//! on-disk format the `seqfuzz` CLI reads.

#![allow(clippy::result_large_err)]

pub mod contract_spec;
pub mod sequence_file;

pub use contract_spec::{ContractSpec, SetupHookSpec};
pub use sequence_file::SequenceFile;
