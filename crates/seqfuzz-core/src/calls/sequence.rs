//! Call sequences and their execution annotations.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use seqfuzz_types::Hash32;
use serde::{Deserialize, Serialize};

use super::message::CallMessage;
use crate::contracts::{ContractDefinition, ContractRef, Contracts};
use crate::tracer::ExecutionTrace;

/// Where an executed call landed on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReference {
    pub block_number: u64,
    pub block_timestamp: u64,
    /// Index of the transaction within its block.
    pub transaction_index: usize,
    pub transaction_hash: Hash32,
}

/// One call in a sequence plus its timing constraints.
///
/// `chain_reference` is `Some` exactly when the call has been placed into a
/// block. `execution_trace` is only filled when tracing was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSequenceElement {
    /// Contract the call targets, used to look up its setup hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractRef>,

    pub call: CallMessage,

    /// Minimum block number advance relative to the previous element.
    #[serde(default)]
    pub block_number_delay: u64,

    /// Minimum timestamp advance (seconds) relative to the previous element.
    #[serde(default)]
    pub block_timestamp_delay: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_reference: Option<ChainReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_trace: Option<ExecutionTrace>,
}

impl CallSequenceElement {
    pub fn new(
        contract: Option<&Arc<ContractDefinition>>,
        call: CallMessage,
        block_number_delay: u64,
        block_timestamp_delay: u64,
    ) -> Self {
        Self {
            contract: contract.map(ContractRef::new),
            call,
            block_number_delay,
            block_timestamp_delay,
            chain_reference: None,
            execution_trace: None,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.chain_reference.is_some()
    }

    /// A copy with execution annotations removed, ready to run again.
    pub fn clone_unexecuted(&self) -> Self {
        Self {
            chain_reference: None,
            execution_trace: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for CallSequenceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chain_reference {
            Some(r) => write!(f, "[block {}, tx {}] ", r.block_number, r.transaction_index)?,
            None => write!(f, "[not executed] ")?,
        }
        if let Some(contract) = &self.contract {
            write!(f, "{}: ", contract.name())?;
        }
        write!(f, "{}", self.call)?;
        if self.block_number_delay > 0 || self.block_timestamp_delay > 0 {
            write!(
                f,
                " (delay: {} blocks, {}s)",
                self.block_number_delay, self.block_timestamp_delay
            )?;
        }
        Ok(())
    }
}

/// An ordered list of call sequence elements.
///
/// As an executed record it may be longer than the sequence that was
/// requested, because injected setup hook calls are recorded too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallSequence(Vec<CallSequenceElement>);

impl CallSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: CallSequenceElement) {
        self.0.push(element);
    }

    pub fn into_inner(self) -> Vec<CallSequenceElement> {
        self.0
    }

    /// Re-link every element's contract reference against `contracts`.
    ///
    /// Returns the names that could not be resolved.
    pub fn resolve_contracts(&mut self, contracts: &Contracts) -> Vec<String> {
        let mut missing = Vec::new();
        for element in self.0.iter_mut() {
            if let Some(reference) = element.contract.as_mut() {
                if !reference.resolve(contracts) && !missing.iter().any(|m| m == reference.name())
                {
                    missing.push(reference.name().to_string());
                }
            }
        }
        missing
    }

    /// A copy with every execution annotation removed.
    pub fn clone_unexecuted(&self) -> Self {
        self.0.iter().map(|e| e.clone_unexecuted()).collect()
    }
}

impl Deref for CallSequence {
    type Target = Vec<CallSequenceElement>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for CallSequence {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<CallSequenceElement>> for CallSequence {
    fn from(elements: Vec<CallSequenceElement>) -> Self {
        CallSequence(elements)
    }
}

impl FromIterator<CallSequenceElement> for CallSequence {
    fn from_iter<I: IntoIterator<Item = CallSequenceElement>>(iter: I) -> Self {
        CallSequence(iter.into_iter().collect())
    }
}

impl IntoIterator for CallSequence {
    type Item = CallSequenceElement;
    type IntoIter = std::vec::IntoIter<CallSequenceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CallSequence {
    type Item = &'a CallSequenceElement;
    type IntoIter = std::slice::Iter<'a, CallSequenceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for CallSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.0.iter().enumerate() {
            writeln!(f, "{}) {}", i + 1, element)?;
        }
        Ok(())
    }
}
