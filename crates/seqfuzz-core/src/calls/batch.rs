//! Parallel execution of independent call sequences.
//!
//! A chain must be driven by one execution at a time, so parallelism comes
//! from giving each sequence its own chain. `make_chain` is called once per
//! sequence (typically forking a shared base chain) and every run happens on
//! the rayon thread pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::execution::execute_call_sequence;
use super::sequence::CallSequence;
use crate::chain::ChainAdapter;
use crate::errors::SequenceExecutionFailure;

/// Outcome of one sequence in a batch.
pub struct BatchRun<C> {
    /// The chain the sequence ran on, in its final state.
    pub chain: C,
    pub result: Result<CallSequence, SequenceExecutionFailure>,
}

/// Results of [`execute_independent`], in input order.
pub struct BatchResult<C> {
    pub runs: Vec<BatchRun<C>>,
    pub successful: usize,
    pub elapsed: Duration,
}

impl<C> BatchResult<C> {
    pub fn failed(&self) -> usize {
        self.runs.len() - self.successful
    }
}

/// Execute each sequence on its own chain, in parallel.
pub fn execute_independent<C, F>(make_chain: F, sequences: Vec<CallSequence>) -> BatchResult<C>
where
    C: ChainAdapter + Send,
    F: Fn(usize) -> C + Sync,
{
    use rayon::prelude::*;

    let start = Instant::now();
    let successful = AtomicUsize::new(0);

    let runs: Vec<BatchRun<C>> = sequences
        .into_par_iter()
        .enumerate()
        .map(|(i, sequence)| {
            let mut chain = make_chain(i);
            let result = execute_call_sequence(&mut chain, sequence);
            match &result {
                Ok(_) => {
                    successful.fetch_add(1, Ordering::Relaxed);
                }
                Err(failure) => {
                    tracing::debug!(sequence = i, error = %failure, "batch sequence failed");
                }
            }
            BatchRun { chain, result }
        })
        .collect();

    let result = BatchResult {
        runs,
        successful: successful.into_inner(),
        elapsed: start.elapsed(),
    };
    tracing::debug!(
        sequences = result.runs.len(),
        successful = result.successful,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "batch complete"
    );
    result
}
