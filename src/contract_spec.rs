//! Contracts manifest.
//!
//! Contract definitions as they appear in a reproducer file:
//!
//! ```json
//! {
//!   "name": "Vault",
//!   "methods": ["deposit(uint256)", "withdraw(uint256)"],
//!   "setup_hook": { "method": "setUp()", "deployer": "0x10000" }
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use seqfuzz_core::calls::AbiMethod;
use seqfuzz_core::contracts::{ContractDefinition, ContractSetupHook};
use seqfuzz_types::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupHookSpec {
    /// Method signature; must take no arguments.
    pub method: String,
    /// Sender of the hook call. Falls back to the configured deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_hook: Option<SetupHookSpec>,
}

impl ContractSpec {
    /// Describe an existing definition.
    pub fn from_definition(definition: &ContractDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            methods: definition.methods.iter().map(|m| m.signature()).collect(),
            setup_hook: definition.setup_hook.as_ref().map(|hook| SetupHookSpec {
                method: hook.method.signature(),
                deployer: Some(hook.deployer),
            }),
        }
    }

    /// Parse the method signatures into a definition.
    pub fn to_definition(&self, default_deployer: Address) -> Result<ContractDefinition> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("contract name must not be empty"));
        }
        let methods = self
            .methods
            .iter()
            .map(|sig| {
                AbiMethod::parse(sig)
                    .with_context(|| format!("contract {}: invalid method", self.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut definition = ContractDefinition::new(self.name.clone(), methods);
        if let Some(hook) = &self.setup_hook {
            let method = AbiMethod::parse(&hook.method)
                .with_context(|| format!("contract {}: invalid setup hook", self.name))?;
            if !method.inputs.is_empty() {
                return Err(anyhow!(
                    "contract {}: setup hook {} must not take arguments",
                    self.name,
                    method
                ));
            }
            let deployer = hook.deployer.unwrap_or(default_deployer);
            definition = definition.with_setup_hook(ContractSetupHook::new(method, deployer));
        }
        Ok(definition)
    }
}
