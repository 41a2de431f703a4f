//! Plan approval commands.

use anyhow::{Context, Result};
use console::style;

/// Approve the pending plan and run the implementing turn.
pub fn approve(project: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let record = workspace.find_project(project).map_err(super::with_hint)?;
    let backend = super::backend(&workspace)?;
    let mut orchestrator = workspace.orchestrator_for(&record, backend)?;

    let outcome = super::chat::with_spinner("Implementing plan...", || {
        orchestrator.execute_approved_plan()
    })?
    .map_err(super::with_hint)?;
    workspace
        .save_session(&orchestrator)
        .context("Failed to save project state")?;

    super::chat::print_outcome(&outcome, &orchestrator);
    Ok(())
}

/// Discard the pending plan.
pub fn reject(project: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let mut orchestrator = super::offline_orchestrator(&workspace, project)?;

    orchestrator.reject_plan().map_err(super::with_hint)?;
    workspace
        .save_session(&orchestrator)
        .context("Failed to save project state")?;

    println!("{} Plan discarded.", style("✓").green());
    Ok(())
}
