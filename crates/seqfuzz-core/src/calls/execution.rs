//! Call sequence execution.
//!
//! Turns a sequence of calls into committed blocks on a [`ChainAdapter`]:
//!
//! 1. Fetch the next element from the caller's element source
//! 2. Inject the target contract's setup hook call if it has not run yet
//! 3. Place the call into a block, honoring its block number / timestamp
//!    delays and splitting across blocks when the pending one is full
//! 4. Record where the call landed and ask the continuation check whether
//!    to keep going
//!
//! When the source is exhausted (or the check asks to stop) the last pending
//! block is committed. On error nothing is committed; the pending block is
//! left open and the failure carries everything executed so far.
//!
//! A setup hook only counts as fired once the block holding it is committed.
//! Hooks left in an uncommitted block are injected again by the next run on
//! the same chain.

use std::sync::Arc;

use seqfuzz_types::Address;
use smallvec::SmallVec;

use super::sequence::{CallSequence, CallSequenceElement, ChainReference};
use super::CallMessage;
use crate::chain::ChainAdapter;
use crate::contracts::{ContractDefinition, Contracts};
use crate::errors::{ChainError, SequenceExecutionError, SequenceExecutionFailure};
use crate::tracer::{ExecutionTracer, TransactionTracer};

/// Check run after each executed element. Returns `true` to stop execution.
pub type ContinuationFn<'a> = dyn FnMut(&CallSequence) -> anyhow::Result<bool> + 'a;

/// Optional knobs for [`execute_call_sequence_iteratively`].
#[derive(Default)]
pub struct ExecuteOptions<'a> {
    /// Halts iteration early when it returns `true`.
    pub continuation: Option<Box<ContinuationFn<'a>>>,

    /// Extra tracers attached to every transaction.
    pub tracers: SmallVec<[Arc<dyn TransactionTracer>; 1]>,
}

impl<'a> ExecuteOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the continuation check.
    pub fn with_continuation<F>(mut self, check: F) -> Self
    where
        F: FnMut(&CallSequence) -> anyhow::Result<bool> + 'a,
    {
        self.continuation = Some(Box::new(check));
        self
    }

    /// Builder method: attach a tracer.
    pub fn with_tracer(mut self, tracer: Arc<dyn TransactionTracer>) -> Self {
        self.tracers.push(tracer);
        self
    }
}

/// Execute a call sequence on `chain`, pulling elements one at a time.
///
/// `fetch` is called with indices 0, 1, 2, ... and returns `Ok(None)` when
/// the sequence is exhausted. Elements are moved into the returned executed
/// record, which also contains any injected setup hook calls.
pub fn execute_call_sequence_iteratively<C, F>(
    chain: &mut C,
    mut fetch: F,
    mut options: ExecuteOptions<'_>,
) -> Result<CallSequence, SequenceExecutionFailure>
where
    C: ChainAdapter + ?Sized,
    F: FnMut(usize) -> anyhow::Result<Option<CallSequenceElement>>,
{
    let mut executed = CallSequence::new();
    let mut hooks = PlacedHooks::default();

    for index in 0.. {
        let mut element = match fetch(index) {
            Ok(Some(element)) => element,
            Ok(None) => break,
            Err(source) => {
                return Err(SequenceExecutionFailure::new(
                    executed,
                    SequenceExecutionError::ElementSource { index, source },
                ))
            }
        };

        let hook_injected = match execute_contract_setup_hook(
            chain,
            &element,
            index,
            &mut executed,
            &mut hooks,
            &options.tracers,
        ) {
            Ok(injected) => injected,
            Err(error) => return Err(SequenceExecutionFailure::new(executed, error)),
        };

        // The element shares the block its setup hook was placed in, unless
        // capacity splits them. The record keeps 0/0 for the element and the
        // requested delays on the hook element, so replaying it places both
        // the same way.
        if hook_injected {
            element.block_number_delay = 0;
            element.block_timestamp_delay = 0;
        }

        let placed = add_tx_to_pending_block(
            chain,
            element.block_number_delay,
            element.block_timestamp_delay,
            &element.call,
            &mut hooks,
            &options.tracers,
            index,
        )
        .and_then(|()| pending_chain_reference(&*chain).map_err(SequenceExecutionError::from));
        match placed {
            Ok(reference) => element.chain_reference = Some(reference),
            Err(error) => return Err(SequenceExecutionFailure::new(executed, error)),
        }
        record_replayed_setup_hook(&element, &mut hooks);
        executed.push(element);

        if let Some(check) = options.continuation.as_mut() {
            match check(&executed) {
                Ok(true) => {
                    tracing::debug!(index, "execution check requested stop");
                    break;
                }
                Ok(false) => {}
                Err(source) => {
                    return Err(SequenceExecutionFailure::new(
                        executed,
                        SequenceExecutionError::ContinuationCheck { index, source },
                    ))
                }
            }
        }
    }

    if chain.pending_block().is_some() {
        if let Err(err) = commit_block(chain, &mut hooks) {
            return Err(SequenceExecutionFailure::new(executed, err.into()));
        }
    }
    Ok(executed)
}

/// Execute a fully known call sequence.
pub fn execute_call_sequence<C>(
    chain: &mut C,
    sequence: CallSequence,
) -> Result<CallSequence, SequenceExecutionFailure>
where
    C: ChainAdapter + ?Sized,
{
    let mut elements = sequence.into_iter();
    execute_call_sequence_iteratively(chain, |_| Ok(elements.next()), ExecuteOptions::default())
}

/// Execute a call sequence with an [`ExecutionTracer`] attached, then attach
/// the captured traces to the executed elements.
///
/// Only the last executed element gets a trace unless `verbose_tracing` is
/// set, in which case every element does. Traces are attached on failure too.
pub fn execute_call_sequence_with_execution_tracer<C>(
    chain: &mut C,
    contracts: &Contracts,
    sequence: CallSequence,
    verbose_tracing: bool,
) -> Result<CallSequence, SequenceExecutionFailure>
where
    C: ChainAdapter + ?Sized,
{
    let tracer = ExecutionTracer::new(contracts.clone());
    let options = ExecuteOptions::new().with_tracer(tracer.native_tracer());

    let mut elements = sequence.into_iter();
    let result = execute_call_sequence_iteratively(chain, |_| Ok(elements.next()), options);

    match result {
        Ok(mut executed) => {
            attach_execution_traces(&tracer, &mut executed, verbose_tracing);
            Ok(executed)
        }
        Err(mut failure) => {
            attach_execution_traces(&tracer, &mut failure.executed, verbose_tracing);
            Err(failure)
        }
    }
}

fn attach_execution_traces(tracer: &ExecutionTracer, sequence: &mut CallSequence, verbose: bool) {
    let trace_from = if verbose {
        0
    } else {
        sequence.len().saturating_sub(1)
    };
    for element in sequence.iter_mut().skip(trace_from) {
        if let Some(reference) = &element.chain_reference {
            element.execution_trace = tracer.trace(&reference.transaction_hash);
        }
    }
}

/// Setup hooks placed during one run whose blocks are not committed yet.
#[derive(Default)]
struct PlacedHooks {
    placed: Vec<(Arc<ContractDefinition>, Address)>,
}

impl PlacedHooks {
    fn contains(&self, contract: &Arc<ContractDefinition>, target: Address) -> bool {
        self.placed
            .iter()
            .any(|(c, t)| *t == target && Arc::ptr_eq(c, contract))
    }

    fn insert(&mut self, contract: Arc<ContractDefinition>, target: Address) {
        if !self.contains(&contract, target) {
            self.placed.push((contract, target));
        }
    }

    /// Mark every placed hook fired on `chain_instance`.
    fn mark_committed(&mut self, chain_instance: u64) {
        for (contract, target) in self.placed.drain(..) {
            if let Some(hook) = contract.setup_hook.as_ref() {
                hook.mark_fired(chain_instance, target);
            }
        }
    }
}

/// Commit the pending block. Hooks placed so far all live in committed
/// blocks afterwards.
fn commit_block<C>(chain: &mut C, hooks: &mut PlacedHooks) -> Result<(), ChainError>
where
    C: ChainAdapter + ?Sized,
{
    chain.commit_pending_block()?;
    hooks.mark_committed(chain.instance_id());
    Ok(())
}

/// Run the setup hook of the element's contract if it has not run yet.
///
/// Returns whether a hook call was injected.
fn execute_contract_setup_hook<C>(
    chain: &mut C,
    element: &CallSequenceElement,
    index: usize,
    executed: &mut CallSequence,
    hooks: &mut PlacedHooks,
    tracers: &[Arc<dyn TransactionTracer>],
) -> Result<bool, SequenceExecutionError>
where
    C: ChainAdapter + ?Sized,
{
    let Some(contract) = element.contract.as_ref().and_then(|c| c.definition()) else {
        return Ok(false);
    };
    let Some(hook) = contract.setup_hook.as_ref() else {
        return Ok(false);
    };
    let Some(target) = element.call.to else {
        return Ok(false);
    };
    if hook.has_fired(chain.instance_id(), target)
        || hooks.contains(&contract, target)
        || hook.matches(&element.call)
    {
        return Ok(false);
    }

    let message = hook.call_message(target, element.call.gas_limit);
    let wrap = |source: SequenceExecutionError| SequenceExecutionError::SetupHook {
        index,
        contract: contract.name.clone(),
        source: Box::new(source),
    };
    add_tx_to_pending_block(
        chain,
        element.block_number_delay,
        element.block_timestamp_delay,
        &message,
        hooks,
        tracers,
        index,
    )
    .map_err(wrap)?;
    let reference = pending_chain_reference(&*chain).map_err(|e| wrap(e.into()))?;
    hooks.insert(Arc::clone(&contract), target);

    tracing::debug!(
        contract = %contract.name,
        target = %target,
        block = reference.block_number,
        "injected setup hook call"
    );

    let mut hook_element = CallSequenceElement::new(
        Some(&contract),
        message,
        element.block_number_delay,
        element.block_timestamp_delay,
    );
    hook_element.chain_reference = Some(reference);
    executed.push(hook_element);
    Ok(true)
}

/// A replayed hook call (from an earlier executed record) counts as a placed
/// hook.
fn record_replayed_setup_hook(element: &CallSequenceElement, hooks: &mut PlacedHooks) {
    let Some(contract) = element.contract.as_ref().and_then(|c| c.definition()) else {
        return;
    };
    let Some(target) = element.call.to else {
        return;
    };
    let replayed = contract
        .setup_hook
        .as_ref()
        .is_some_and(|hook| hook.matches(&element.call));
    if replayed {
        hooks.insert(contract, target);
    }
}

/// Block number / timestamp advance for a new block.
///
/// Both advance by at least 1, and the number never advances more than the
/// timestamp so every block keeps a distinct timestamp.
pub(crate) fn resolve_block_delays(number_delay: u64, timestamp_delay: u64) -> (u64, u64) {
    let timestamp = timestamp_delay.max(1);
    let number = number_delay.max(1).min(timestamp);
    (number, timestamp)
}

/// Add `message` to the pending block, creating or committing blocks as the
/// delays and block capacity require.
///
/// A capacity failure in a non-empty block commits it and retries in a fresh
/// one, derived from the same delays. A capacity failure in an empty block is
/// final.
fn add_tx_to_pending_block<C>(
    chain: &mut C,
    number_delay: u64,
    timestamp_delay: u64,
    message: &CallMessage,
    hooks: &mut PlacedHooks,
    tracers: &[Arc<dyn TransactionTracer>],
    index: usize,
) -> Result<(), SequenceExecutionError>
where
    C: ChainAdapter + ?Sized,
{
    loop {
        // A delayed call always starts a new block.
        if chain.pending_block().is_some() && number_delay > 0 {
            commit_block(chain, hooks)?;
        }

        if chain.pending_block().is_none() {
            let (number_step, timestamp_step) = resolve_block_delays(number_delay, timestamp_delay);
            let head = &chain.head().header;
            let number = head.number.saturating_add(number_step);
            let timestamp = head.timestamp.saturating_add(timestamp_step);
            chain.create_pending_block(number, timestamp, None)?;
        }

        match chain.add_transaction(message, tracers) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_capacity() => {
                let pending_txs = chain
                    .pending_block()
                    .map(|b| b.transactions.len())
                    .unwrap_or(0);
                if pending_txs > 0 {
                    tracing::debug!(
                        index,
                        pending_txs,
                        gas_limit = message.gas_limit,
                        "block full, committing and retrying in a new block"
                    );
                    commit_block(chain, hooks)?;
                    continue;
                }
                tracing::warn!(
                    index,
                    gas_limit = message.gas_limit,
                    error = %err,
                    "call does not fit in an empty block"
                );
                return Err(SequenceExecutionError::BlockCapacityExceeded { index, source: err });
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Chain reference of the last transaction in the pending block.
fn pending_chain_reference<C>(chain: &C) -> Result<ChainReference, ChainError>
where
    C: ChainAdapter + ?Sized,
{
    let block = chain.pending_block().ok_or(ChainError::NoPendingBlock)?;
    let tx = block.transactions.last().ok_or_else(|| ChainError::Execution {
        message: "pending block has no transactions after a successful add".to_string(),
    })?;
    Ok(ChainReference {
        block_number: block.header.number,
        block_timestamp: block.header.timestamp,
        transaction_index: block.transactions.len() - 1,
        transaction_hash: tx.hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_block_delays_minimum_step() {
        assert_eq!(resolve_block_delays(0, 0), (1, 1));
        assert_eq!(resolve_block_delays(0, 10), (1, 10));
    }

    #[test]
    fn test_resolve_block_delays_number_bounded_by_time() {
        assert_eq!(resolve_block_delays(5, 0), (1, 1));
        assert_eq!(resolve_block_delays(5, 3), (3, 3));
        assert_eq!(resolve_block_delays(2, 2), (2, 2));
        assert_eq!(resolve_block_delays(2, 7), (2, 7));
    }
}
