//! Contract definitions and setup hooks.
//!
//! A [`ContractDefinition`] is produced by the compilation pipeline and shared
//! (behind an `Arc`) by every sequence that targets the contract. Sequence
//! elements only hold a [`ContractRef`]: the contract name plus a `Weak`
//! pointer, so definitions are never kept alive by the sequences that mention
//! them.
//!
//! A definition may declare a [`ContractSetupHook`], a one-time initialization
//! method the engine calls before the first interaction with each deployed
//! instance. The hook remembers which instances it already ran for, keyed by
//! chain instance id and contract address, so forked chains start fresh.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use seqfuzz_types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calls::{AbiCallData, AbiMethod, CallData, CallMessage, SELECTOR_SIZE};

/// A one-time initialization method declared by a contract.
pub struct ContractSetupHook {
    /// The setup method. Called with no arguments.
    pub method: AbiMethod,

    /// Privileged sender used for the hook call.
    pub deployer: Address,

    /// (chain instance id, contract address) pairs the hook already ran for.
    fired: Mutex<HashSet<(u64, Address)>>,
}

impl ContractSetupHook {
    pub fn new(method: AbiMethod, deployer: Address) -> Self {
        Self {
            method,
            deployer,
            fired: Mutex::new(HashSet::new()),
        }
    }

    pub fn has_fired(&self, chain_instance: u64, contract: Address) -> bool {
        self.fired.lock().contains(&(chain_instance, contract))
    }

    pub fn mark_fired(&self, chain_instance: u64, contract: Address) {
        self.fired.lock().insert((chain_instance, contract));
    }

    /// Build the hook call for `target`, inheriting `gas_limit`.
    pub fn call_message(&self, target: Address, gas_limit: u64) -> CallMessage {
        let data = AbiCallData {
            method: self.method.clone(),
            args: Vec::new(),
        };
        CallMessage::new(
            self.deployer,
            Some(target),
            0,
            gas_limit,
            CallData::Abi(data),
        )
    }

    /// Whether `call` is this hook's own call (e.g. a hook element replayed
    /// from an executed record).
    pub fn matches(&self, call: &CallMessage) -> bool {
        if call.from != self.deployer || call.to.is_none() || call.value != 0 {
            return false;
        }
        let input = call.input();
        input.len() == SELECTOR_SIZE && input[..] == self.method.selector()
    }
}

impl Clone for ContractSetupHook {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            deployer: self.deployer,
            fired: Mutex::new(self.fired.lock().clone()),
        }
    }
}

impl fmt::Debug for ContractSetupHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractSetupHook")
            .field("method", &self.method.signature())
            .field("deployer", &self.deployer)
            .field("fired", &self.fired.lock().len())
            .finish()
    }
}

/// A compiled contract the fuzzer can call.
#[derive(Debug, Clone)]
pub struct ContractDefinition {
    pub name: String,
    pub methods: Vec<AbiMethod>,
    pub setup_hook: Option<ContractSetupHook>,
}

impl ContractDefinition {
    pub fn new(name: impl Into<String>, methods: Vec<AbiMethod>) -> Self {
        Self {
            name: name.into(),
            methods,
            setup_hook: None,
        }
    }

    /// Builder method: declare a setup hook.
    pub fn with_setup_hook(mut self, hook: ContractSetupHook) -> Self {
        self.setup_hook = Some(hook);
        self
    }

    pub fn method_by_name(&self, name: &str) -> Option<&AbiMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_by_selector(&self, selector: &[u8; SELECTOR_SIZE]) -> Option<&AbiMethod> {
        self.methods
            .iter()
            .chain(self.setup_hook.as_ref().map(|h| &h.method))
            .find(|m| &m.selector() == selector)
    }
}

/// The set of contract definitions known to the fuzzer.
#[derive(Debug, Clone, Default)]
pub struct Contracts(Vec<Arc<ContractDefinition>>);

impl Contracts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition and return the shared handle.
    pub fn push(&mut self, definition: ContractDefinition) -> Arc<ContractDefinition> {
        let definition = Arc::new(definition);
        self.0.push(Arc::clone(&definition));
        definition
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<ContractDefinition>> {
        self.0.iter().find(|c| c.name == name)
    }

    /// Find the contract and method an input selector belongs to.
    ///
    /// When several contracts share a selector the first registered wins.
    pub fn resolve_method(
        &self,
        selector: &[u8; SELECTOR_SIZE],
    ) -> Option<(&Arc<ContractDefinition>, &AbiMethod)> {
        self.0
            .iter()
            .find_map(|c| c.method_by_selector(selector).map(|m| (c, m)))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ContractDefinition>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ContractDefinition> for Contracts {
    fn from_iter<I: IntoIterator<Item = ContractDefinition>>(iter: I) -> Self {
        Contracts(iter.into_iter().map(Arc::new).collect())
    }
}

/// Non-owning reference from a sequence element to its contract definition.
///
/// Serialized as the contract name only; call
/// [`CallSequence::resolve_contracts`](crate::calls::CallSequence::resolve_contracts)
/// after loading to re-link the definition.
#[derive(Clone)]
pub struct ContractRef {
    name: String,
    definition: Weak<ContractDefinition>,
}

impl ContractRef {
    pub fn new(definition: &Arc<ContractDefinition>) -> Self {
        Self {
            name: definition.name.clone(),
            definition: Arc::downgrade(definition),
        }
    }

    /// A reference that only knows the contract name.
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: Weak::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The definition, if it is linked and still alive.
    pub fn definition(&self) -> Option<Arc<ContractDefinition>> {
        self.definition.upgrade()
    }

    pub fn is_resolved(&self) -> bool {
        self.definition.strong_count() > 0
    }

    /// Link to the definition with the same name in `contracts`.
    pub fn resolve(&mut self, contracts: &Contracts) -> bool {
        match contracts.find_by_name(&self.name) {
            Some(definition) => {
                self.definition = Arc::downgrade(definition);
                true
            }
            None => false,
        }
    }
}

impl PartialEq for ContractRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ContractRef {}

impl fmt::Debug for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractRef({}", self.name)?;
        if !self.is_resolved() {
            write!(f, ", unresolved")?;
        }
        write!(f, ")")
    }
}

impl Serialize for ContractRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for ContractRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ContractRef::unresolved(String::deserialize(deserializer)?))
    }
}
