//! Project management commands.

use anyhow::{Context, Result};
use console::style;
use forge_core::{list_files, FileTree};
use std::fs;
use std::path::Path;

pub fn new(name: &str, from: Option<&Path>) -> Result<()> {
    let workspace = super::open_workspace()?;
    let files = match from {
        Some(dir) => read_tree(dir)
            .with_context(|| format!("Failed to read seed files from {}", dir.display()))?,
        None => FileTree::new(),
    };

    let project = workspace.create_project(name, files)?;
    println!("{} Created project {}", style("✓").green(), style(&project.name).bold());
    println!("  ID:    {}", project.id);
    println!("  Files: {}", project.files.len());

    Ok(())
}

pub fn list() -> Result<()> {
    let workspace = super::open_workspace()?;
    let projects = workspace.list_projects()?;

    if projects.is_empty() {
        println!("No projects yet. Create one with 'forge project new <name>'.");
        return Ok(());
    }

    for project in projects {
        println!(
            "{}  {:<24} {:>3} files  {}",
            style(&project.id[..8.min(project.id.len())]).dim(),
            project.name,
            project.files.len(),
            project.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

pub fn show(project: &str, contents: bool) -> Result<()> {
    let workspace = super::open_workspace()?;
    let project = workspace.find_project(project).map_err(super::with_hint)?;

    println!("{} ({})", style(&project.name).bold(), project.id);
    println!("  Public:  {}", project.is_public);
    println!("  Updated: {}", project.updated_at.to_rfc3339());
    println!();

    if contents {
        for (path, content) in &project.files {
            println!("{}", style(format!("── {} ──", path)).cyan());
            println!("{}", content);
        }
    } else {
        for entry in list_files(&project.files, "", true) {
            println!("  {}", entry);
        }
    }

    Ok(())
}

pub fn export(project: &str, dest: &Path) -> Result<()> {
    let workspace = super::open_workspace()?;
    let written = workspace
        .export_project(project, dest)
        .map_err(super::with_hint)
        .with_context(|| format!("Failed to export to {}", dest.display()))?;

    println!(
        "{} Wrote {} file(s) to {}",
        style("✓").green(),
        written,
        dest.display()
    );
    Ok(())
}

pub fn delete(project: &str) -> Result<()> {
    let workspace = super::open_workspace()?;
    let removed = workspace.delete_project(project).map_err(super::with_hint)?;
    println!("{} Deleted project {}", style("✓").green(), removed.name);
    Ok(())
}

/// Reads every regular file under `dir` into a tree, skipping dot entries.
fn read_tree(dir: &Path) -> Result<FileTree> {
    let mut tree = FileTree::new();
    collect(dir, dir, &mut tree)?;
    Ok(tree)
}

fn collect(root: &Path, dir: &Path, tree: &mut FileTree) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, tree)?;
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            tracing::warn!(path = %path.display(), "skipping non-text seed file");
            continue;
        };
        let relative = path
            .strip_prefix(root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        tree.insert(relative, content);
    }
    Ok(())
}
