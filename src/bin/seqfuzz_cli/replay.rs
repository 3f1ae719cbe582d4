//! Replay command - execute a reproducer file on a fresh chain

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::output::{format_replay, format_replay_json, BlockSummary, ReplayOutput};
use seqfuzz::SequenceFile;
use seqfuzz_core::calls::{execute_call_sequence, execute_call_sequence_with_execution_tracer};
use seqfuzz_core::chain::TestChain;

#[derive(Args, Debug)]
pub struct ReplayCmd {
    /// Reproducer file (JSON)
    pub file: PathBuf,

    /// Attach an execution trace to the last executed call
    #[arg(long)]
    pub trace: bool,

    /// Attach execution traces to every executed call (implies --trace)
    #[arg(long)]
    pub verbose_trace: bool,

    /// Write the executed record (with chain references) as a new reproducer file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl ReplayCmd {
    pub fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        let file = SequenceFile::load(&self.file)?;
        let prepared = file
            .prepare()
            .with_context(|| format!("invalid reproducer file {}", self.file.display()))?;
        let requested = prepared.sequence.len();

        let mut chain = TestChain::new(&prepared.config);
        let verbose_tracing = self.verbose_trace || prepared.config.verbose_tracing;
        tracing::debug!(
            file = %self.file.display(),
            elements = requested,
            contracts = prepared.contracts.len(),
            trace = self.trace || verbose_tracing,
            "replaying call sequence"
        );

        let result = if self.trace || verbose_tracing {
            execute_call_sequence_with_execution_tracer(
                &mut chain,
                &prepared.contracts,
                prepared.sequence,
                verbose_tracing,
            )
        } else {
            execute_call_sequence(&mut chain, prepared.sequence)
        };

        let (executed, error) = match result {
            Ok(executed) => (executed, None),
            Err(failure) => {
                let (executed, error) = failure.into_parts();
                (executed, Some(error))
            }
        };

        // Genesis is not part of the replay.
        let blocks = chain
            .blocks()
            .iter()
            .skip(1)
            .map(BlockSummary::from_block)
            .collect();
        let output = ReplayOutput {
            success: error.is_none(),
            error: error.as_ref().map(|e| e.to_string()),
            capacity_exceeded: error
                .as_ref()
                .map(|e| e.is_capacity_exceeded())
                .unwrap_or(false),
            requested,
            executed: &executed,
            blocks,
        };

        if json_output {
            println!("{}", format_replay_json(&output));
        } else {
            print!("{}", format_replay(&output, verbose));
        }

        if let Some(out) = &self.out {
            let record = SequenceFile::new(file.config.clone(), &prepared.contracts, executed.clone());
            record.save(out)?;
            if !json_output {
                println!("Executed record written to {}", out.display());
            }
        }

        match error {
            None => Ok(()),
            Some(error) => Err(anyhow::Error::new(error).context(format!(
                "replay of {} failed after {} executed call(s)",
                self.file.display(),
                executed.len()
            ))),
        }
    }
}
