//! Conversation memory eviction.

use anyhow::Result;
use console::style;

/// Drop idle contexts and trim to the configured maximum.
pub fn run() -> Result<()> {
    let workspace = super::open_workspace()?;
    let mut memory = workspace.memory_store();
    let config = memory.config().clone();

    println!(
        "{} Evicting contexts idle for more than {} days (keeping at most {})...",
        style("→").cyan(),
        config.idle_eviction_days,
        config.max_contexts
    );

    let report = memory.cleanup_old_contexts();

    println!();
    println!("{}", style("Memory Cleanup Report:").bold());
    println!("  Expired:   {}", style(report.expired.len()).yellow());
    println!("  Overflow:  {}", style(report.overflow.len()).yellow());
    println!("  Remaining: {}", style(report.remaining).green());

    for id in report.expired.iter().chain(&report.overflow) {
        println!("  {} {}", style("×").red(), id);
    }

    let stats = memory.stats();
    if stats.persist_failures > 0 {
        println!();
        println!(
            "{} {} store write(s) failed; see logs with RUST_LOG=warn",
            style("⚠").yellow().bold(),
            stats.persist_failures
        );
    }

    Ok(())
}
