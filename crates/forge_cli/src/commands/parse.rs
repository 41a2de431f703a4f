//! Run the response parser on a saved model reply.

use anyhow::{Context, Result};
use console::style;
use forge_core::{parse_response, FileTree, ParseOutcome};
use std::io::Read;
use std::path::Path;

pub fn run(file: Option<&Path>, first: bool) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
            raw
        }
    };

    let outcome = parse_response(&raw, &FileTree::new(), first);
    let status = match &outcome {
        ParseOutcome::Parsed(_) => style("parsed").green(),
        ParseOutcome::PartialRecovery { .. } => style("partially recovered").yellow(),
        ParseOutcome::Failed { .. } => style("failed").red(),
    };
    println!("Status:  {}", status);
    if let ParseOutcome::Failed { reason } = &outcome {
        println!("Reason:  {}", reason);
    }
    println!("Message: {}", outcome.message());

    if let Some(plan) = outcome.plan() {
        println!("Plan:");
        for step in plan {
            println!("  - {}", step);
        }
    }
    if let Some(changes) = outcome.file_changes() {
        println!("File changes:");
        for (path, change) in changes {
            match change {
                Some(content) => println!("  {} {} ({} bytes)", style("M").green(), path, content.len()),
                None => println!("  {} {}", style("D").red(), path),
            }
        }
    }

    Ok(())
}
