//! Shared types for the seqfuzz workspace.
//!
//! This crate provides the foundational value types used by the execution
//! engine and the CLI, so neither has to depend on the other for them:
//!
//! - [`Address`] - 20-byte account / contract address
//! - [`Hash32`] - 32-byte digest used for transaction and block hashes
//! - [`encoding`] - hex helpers shared by the serde impls

pub mod address;
pub mod encoding;

pub use address::Address;
pub use encoding::Hash32;
