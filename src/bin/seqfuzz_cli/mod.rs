//! CLI subcommand implementations for seqfuzz

pub mod output;
pub mod replay;
pub mod validate;
