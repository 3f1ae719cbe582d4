//! Validate command - check a reproducer file without executing it

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use seqfuzz::SequenceFile;

#[derive(Args, Debug)]
pub struct ValidateCmd {
    /// Reproducer file (JSON)
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    valid: bool,
    contracts: usize,
    setup_hooks: usize,
    elements: usize,
    /// Elements that already carry chain references (an executed record).
    executed_elements: usize,
    block_gas_limit: u64,
}

impl ValidateCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let file = SequenceFile::load(&self.file)?;
        let prepared = file
            .prepare()
            .with_context(|| format!("invalid reproducer file {}", self.file.display()))?;

        let output = ValidateOutput {
            valid: true,
            contracts: prepared.contracts.len(),
            setup_hooks: prepared
                .contracts
                .iter()
                .filter(|c| c.setup_hook.is_some())
                .count(),
            elements: file.sequence.len(),
            executed_elements: file.sequence.iter().filter(|e| e.is_executed()).count(),
            block_gas_limit: prepared.config.block_gas_limit,
        };

        if json_output {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("\x1b[32m✓ {} is valid\x1b[0m", self.file.display());
            println!(
                "  {} contract(s), {} with a setup hook",
                output.contracts, output.setup_hooks
            );
            print!("  {} call(s)", output.elements);
            if output.executed_elements > 0 {
                print!(" ({} already executed)", output.executed_elements);
            }
            println!();
        }
        Ok(())
    }
}
