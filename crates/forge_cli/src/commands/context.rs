//! Conversation memory inspection.

use anyhow::Result;
use console::style;

pub fn run(project: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let record = workspace.find_project(project).map_err(super::with_hint)?;
    let memory = workspace.memory_store();

    let Some(context) = memory.peek(&record.id) else {
        println!("No conversation recorded for {} yet.", record.name);
        return Ok(());
    };

    println!("{}", style(format!("Conversation: {}", record.name)).bold());
    println!("  Messages:      {}", context.messages.len());
    println!("  Files tracked: {}", context.file_tree.len());
    println!("  Last activity: {}", context.last_activity.to_rfc3339());
    if !context.summary.is_empty() {
        println!("  Summary:       {}", context.summary);
    }
    if !context.goals.is_empty() {
        println!("  Goals:");
        for goal in &context.goals {
            println!("    - {}", goal);
        }
    }

    println!();
    println!("{}", style("Prompt context:").bold());
    println!("{}", memory.context_for_generation(&record.id));

    let stats = memory.stats();
    println!();
    println!(
        "{} context(s) in memory, {} message(s) total",
        stats.total_contexts, stats.total_messages
    );
    Ok(())
}
