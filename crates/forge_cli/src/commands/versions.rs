//! Version history commands.

use anyhow::{Context, Result};
use console::style;

pub fn list(project: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let orchestrator = super::offline_orchestrator(&workspace, project)?;

    for version in orchestrator.versions() {
        let origin = if version.metadata.auto_generated {
            style("auto").dim()
        } else {
            style("saved").green()
        };
        println!(
            "{}  {}  {:<6} {:<8} {:<5} {}",
            style(&version.id[..8.min(version.id.len())]).yellow(),
            version.timestamp.format("%Y-%m-%d %H:%M"),
            origin,
            version.metadata.change_type,
            version.metadata.severity,
            version.name
        );
    }

    Ok(())
}

pub fn save(project: &str, name: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let mut orchestrator = super::offline_orchestrator(&workspace, project)?;

    let version = orchestrator.save_version(name).clone();
    workspace
        .save_session(&orchestrator)
        .context("Failed to save version")?;

    println!(
        "{} Saved version {} ({} files)",
        style("✓").green(),
        style(&version.name).bold(),
        version.files.len()
    );
    println!("  ID: {}", version.id);
    Ok(())
}

pub fn restore(project: &str, version: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let mut orchestrator = super::offline_orchestrator(&workspace, project)?;

    let id = resolve_version_id(orchestrator.versions(), version);
    let files = orchestrator
        .restore_version(&id)
        .map_err(super::with_hint)?
        .len();
    workspace
        .save_session(&orchestrator)
        .context("Failed to save restored files")?;

    println!("{} Restored {} file(s) from {}", style("✓").green(), files, id);
    Ok(())
}

/// Expands a unique id prefix (as printed by `list`) to the full id.
fn resolve_version_id(versions: &[forge_core::Version], given: &str) -> String {
    let mut matches = versions.iter().filter(|v| v.id.starts_with(given));
    match (matches.next(), matches.next()) {
        (Some(only), None) => only.id.clone(),
        _ => given.to_string(),
    }
}
