//! Initialize a new workspace.

use anyhow::{Context, Result};
use forge_core::Workspace;

/// Initialize a workspace in the current directory.
pub fn run() -> Result<()> {
    let workspace = Workspace::init(".")
        .map_err(super::with_hint)
        .context("Failed to initialize workspace")?;
    let config = workspace.config();

    println!("Initialized appforge workspace in .forge/");
    println!();
    println!("  .forge/config.toml  - Memory, versioning and generation settings");
    println!("  .forge/store.redb   - Projects, conversations and versions");
    println!();
    println!("Model: {}", config.generation.model);
    println!(
        "API key is read from ${} when chatting.",
        config.generation.api_key_env
    );

    Ok(())
}
