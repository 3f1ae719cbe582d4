//! Engine configuration.
//!
//! [`EngineConfig`] carries the chain parameters the in-memory
//! [`TestChain`](crate::chain::TestChain) is created with and the defaults used
//! when building calls. It serializes to JSON so reproducer files can pin the
//! exact chain a failing sequence was found on.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use seqfuzz_types::Address;
use serde::{Deserialize, Serialize};

/// Default per-block gas capacity.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// Default gas limit for calls built without an explicit one.
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 12_500_000;

/// Default deployer address (the privileged sender of setup hook calls).
pub const DEFAULT_DEPLOYER: u64 = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Gas capacity of every block created on the test chain.
    pub block_gas_limit: u64,

    /// Block number of the genesis block.
    pub genesis_number: u64,

    /// Timestamp (seconds) of the genesis block.
    pub genesis_timestamp: u64,

    /// Gas limit applied to calls that do not specify one.
    pub default_gas_limit: u64,

    /// Deployer address used for contract deployment and setup hooks.
    pub deployer: Address,

    /// Attach execution traces to every executed element instead of only the last.
    pub verbose_tracing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            genesis_number: 0,
            genesis_timestamp: 0,
            default_gas_limit: DEFAULT_CALL_GAS_LIMIT,
            deployer: Address::from_low_u64(DEFAULT_DEPLOYER),
            verbose_tracing: false,
        }
    }
}

impl EngineConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the chain cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block_gas_limit == 0 {
            return Err(anyhow!("block_gas_limit must be greater than zero"));
        }
        if self.default_gas_limit > self.block_gas_limit {
            return Err(anyhow!(
                "default_gas_limit ({}) exceeds block_gas_limit ({}); no default call could ever be placed",
                self.default_gas_limit,
                self.block_gas_limit
            ));
        }
        Ok(())
    }

    /// Builder method: set the per-block gas capacity.
    pub fn with_block_gas_limit(mut self, limit: u64) -> Self {
        self.block_gas_limit = limit;
        self
    }

    /// Builder method: set the genesis block number and timestamp.
    pub fn with_genesis(mut self, number: u64, timestamp: u64) -> Self {
        self.genesis_number = number;
        self.genesis_timestamp = timestamp;
        self
    }

    /// Builder method: set the default call gas limit.
    pub fn with_default_gas_limit(mut self, limit: u64) -> Self {
        self.default_gas_limit = limit;
        self
    }

    /// Builder method: set the deployer address.
    pub fn with_deployer(mut self, deployer: Address) -> Self {
        self.deployer = deployer;
        self
    }

    /// Builder method: set verbose tracing.
    pub fn with_verbose_tracing(mut self, verbose: bool) -> Self {
        self.verbose_tracing = verbose;
        self
    }
}
