//! Reproducer files.
//!
//! A reproducer is a self-contained JSON document the fuzzer writes for a
//! sequence worth keeping (a property violation, a shrunk corpus entry):
//!
//! ```json
//! {
//!   "config": { "block_gas_limit": 30000000 },
//!   "contracts": [ { "name": "Vault", "methods": ["deposit(uint256)"] } ],
//!   "sequence": [ { "contract": "Vault", "call": { ... }, "block_number_delay": 1 } ]
//! }
//! ```
//!
//! Sequence elements reference contracts by name; [`SequenceFile::prepare`]
//! builds the definitions and re-links every element before execution.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use seqfuzz_core::calls::{CallData, CallSequence};
use seqfuzz_core::config::EngineConfig;
use seqfuzz_core::contracts::Contracts;
use serde::{Deserialize, Serialize};

use crate::contract_spec::ContractSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceFile {
    /// Engine settings the sequence was recorded with. Defaults when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<EngineConfig>,

    #[serde(default)]
    pub contracts: Vec<ContractSpec>,

    pub sequence: CallSequence,
}

/// Contracts and a linked, unexecuted sequence ready to run.
#[derive(Debug)]
pub struct PreparedSequence {
    pub config: EngineConfig,
    pub contracts: Contracts,
    pub sequence: CallSequence,
}

impl SequenceFile {
    pub fn new(config: Option<EngineConfig>, contracts: &Contracts, sequence: CallSequence) -> Self {
        Self {
            config,
            contracts: contracts
                .iter()
                .map(|definition| ContractSpec::from_definition(definition))
                .collect(),
            sequence,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse reproducer file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("write {}", path.display()))
    }

    /// The recorded config, or the default.
    pub fn engine_config(&self) -> EngineConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Build contract definitions from the manifest.
    pub fn build_contracts(&self) -> Result<Contracts> {
        let config = self.engine_config();
        let mut seen = HashSet::new();
        let mut contracts = Contracts::new();
        for spec in &self.contracts {
            if !seen.insert(spec.name.as_str()) {
                return Err(anyhow!("duplicate contract {}", spec.name));
            }
            contracts.push(spec.to_definition(config.deployer)?);
        }
        Ok(contracts)
    }

    /// Check the whole file without executing anything.
    ///
    /// Returns the prepared sequence so callers can go on to run it. Calls
    /// without a gas limit get the config's `default_gas_limit`.
    pub fn prepare(&self) -> Result<PreparedSequence> {
        let config = self.engine_config();
        config.validate().context("invalid config")?;
        let contracts = self.build_contracts()?;

        let mut sequence = self.sequence.clone_unexecuted();
        let missing = sequence.resolve_contracts(&contracts);
        if !missing.is_empty() {
            return Err(anyhow!(
                "sequence references unknown contract(s): {}",
                missing.join(", ")
            ));
        }

        for (i, element) in sequence.iter_mut().enumerate() {
            if element.call.gas_limit == 0 {
                element.call.gas_limit = config.default_gas_limit;
            }
            if let CallData::Abi(data) = &element.call.data {
                data.method
                    .check_args(&data.args)
                    .with_context(|| format!("element {}", i))?;
            }
            if element.call.gas_limit > config.block_gas_limit {
                tracing::warn!(
                    element = i,
                    gas_limit = element.call.gas_limit,
                    block_gas_limit = config.block_gas_limit,
                    "call can never fit in a block"
                );
            }
        }

        Ok(PreparedSequence {
            config,
            contracts,
            sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqfuzz_core::calls::{AbiMethod, AbiValue, CallMessage, CallSequenceElement};
    use seqfuzz_core::contracts::ContractDefinition;
    use seqfuzz_types::Address;
    use tempfile::TempDir;

    fn sample() -> (Contracts, SequenceFile) {
        let mut contracts = Contracts::new();
        let token = contracts.push(ContractDefinition::new(
            "Token",
            vec![AbiMethod::parse("mint(uint256)").unwrap()],
        ));
        let call = CallMessage::with_abi_values(
            Address::from_low_u64(1),
            Some(Address::from_low_u64(0xabc)),
            0,
            100_000,
            token.methods[0].clone(),
            vec![AbiValue::Uint(5)],
        )
        .unwrap();
        let sequence: CallSequence = vec![CallSequenceElement::new(Some(&token), call, 1, 3)].into();
        let file = SequenceFile::new(None, &contracts, sequence);
        (contracts, file)
    }

    #[test]
    fn test_save_and_load() {
        let (_contracts, file) = sample();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/repro.json");

        file.save(&path).unwrap();
        let loaded = SequenceFile::load(&path).unwrap();
        assert_eq!(loaded, file);
        assert!(loaded.config.is_none());
    }

    #[test]
    fn test_prepare_links_contracts() {
        let (_contracts, file) = sample();
        let prepared = file.prepare().unwrap();

        assert_eq!(prepared.contracts.len(), 1);
        let contract = prepared.sequence[0].contract.as_ref().unwrap();
        assert!(contract.is_resolved());
        assert_eq!(prepared.config, EngineConfig::default());
    }

    #[test]
    fn test_prepare_rejects_unknown_contract() {
        let (_contracts, mut file) = sample();
        file.contracts.clear();
        let err = file.prepare().unwrap_err();
        assert!(err.to_string().contains("unknown contract(s): Token"));
    }

    #[test]
    fn test_prepare_rejects_duplicate_contract() {
        let (_contracts, mut file) = sample();
        let dup = file.contracts[0].clone();
        file.contracts.push(dup);
        let err = file.prepare().unwrap_err();
        assert!(err.to_string().contains("duplicate contract Token"));
    }

    #[test]
    fn test_prepare_rejects_bad_arguments() {
        let (_contracts, mut file) = sample();
        if let CallData::Abi(data) = &mut file.sequence[0].call.data {
            data.args.push(AbiValue::Bool(true));
        }
        let err = file.prepare().unwrap_err();
        assert!(format!("{:#}", err).contains("element 0"));
    }

    #[test]
    fn test_prepare_fills_default_gas_limit() {
        let (_contracts, mut file) = sample();
        file.sequence[0].call.gas_limit = 0;
        file.config = Some(EngineConfig::default().with_default_gas_limit(250_000));

        let prepared = file.prepare().unwrap();
        assert_eq!(prepared.sequence[0].call.gas_limit, 250_000);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SequenceFile::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
