//! Output formatting for seqfuzz CLI
//!
//! Provides human-readable and JSON output formatting for all commands.

use serde::Serialize;

use seqfuzz_core::calls::CallSequence;
use seqfuzz_core::chain::Block;
use seqfuzz_types::Hash32;

/// One committed block touched by a replay.
#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: usize,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash32>,
}

impl BlockSummary {
    pub fn from_block(block: &Block) -> Self {
        Self {
            number: block.header.number,
            timestamp: block.header.timestamp,
            transactions: block.transactions.len(),
            gas_used: block.header.gas_used,
            hash: block.hash,
        }
    }
}

/// Result of a replay, complete or partial.
#[derive(Debug, Serialize)]
pub struct ReplayOutput<'a> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failing call could never fit in a block.
    pub capacity_exceeded: bool,
    /// Elements requested from the file.
    pub requested: usize,
    pub executed: &'a CallSequence,
    pub blocks: Vec<BlockSummary>,
}

pub fn format_replay_json(output: &ReplayOutput<'_>) -> String {
    serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
}

/// Format a replay for display
pub fn format_replay(output: &ReplayOutput<'_>, verbose: bool) -> String {
    let mut out = String::new();

    match &output.error {
        None => out.push_str("\x1b[32m✓ Sequence executed successfully\x1b[0m\n\n"),
        Some(error) => out.push_str(&format!("\x1b[31m✗ Sequence failed: {}\x1b[0m\n\n", error)),
    }

    let injected = output.executed.len().saturating_sub(output.requested);
    out.push_str(&format!(
        "\x1b[1mExecuted:\x1b[0m {} call(s)",
        output.executed.len()
    ));
    if injected > 0 {
        out.push_str(&format!(" ({} setup hook call(s))", injected));
    }
    out.push('\n');

    for (i, element) in output.executed.iter().enumerate() {
        out.push_str(&format!("  {}) {}\n", i + 1, element));
        if let Some(trace) = &element.execution_trace {
            for line in trace.to_string().lines() {
                out.push_str(&format!("       {}\n", line));
            }
        }
    }
    out.push('\n');

    if !output.blocks.is_empty() {
        out.push_str(&format!(
            "\x1b[1mBlocks:\x1b[0m {} committed\n",
            output.blocks.len()
        ));
        if verbose {
            for block in &output.blocks {
                out.push_str(&format!(
                    "  #{} t={} txs={} gas={}",
                    block.number, block.timestamp, block.transactions, block.gas_used
                ));
                if let Some(hash) = block.hash {
                    out.push_str(&format!(" {}", hash.short()));
                }
                out.push('\n');
            }
        }
    }

    out
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
        }

        let err = ErrorJson {
            error: error.to_string(),
            cause: error.source().map(|e| e.to_string()),
        };
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}
