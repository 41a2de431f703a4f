//! Send a message through the pipeline.

use anyhow::{bail, Context, Result};
use console::style;
use forge_core::{ImageAttachment, TurnInput, TurnOutcome, WorkflowMode, WorkflowOrchestrator};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn run(project: &str, message: &str, discuss: bool, first: bool, images: &[PathBuf]) -> Result<()> {
    let workspace = super::open_workspace()?;
    let record = workspace.find_project(project).map_err(super::with_hint)?;
    let backend = super::backend(&workspace)?;
    let mut orchestrator = workspace.orchestrator_for(&record, backend)?;

    let mut input = TurnInput::new(message).with_images(load_images(images)?);
    if discuss {
        input = input.discussion();
    }
    if first {
        input = input.first_message();
    }

    let outcome = with_spinner("Generating...", || orchestrator.handle_turn(input))?;
    workspace
        .save_session(&orchestrator)
        .context("Failed to save project state")?;

    print_outcome(&outcome, &orchestrator);
    Ok(())
}

/// Runs `work` while a spinner is shown on stderr.
pub fn with_spinner<T>(message: &str, work: impl FnOnce() -> T) -> Result<T> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = work();

    pb.finish_and_clear();
    Ok(result)
}

/// Prints a turn's reply, plan, file actions and new version.
pub fn print_outcome(outcome: &TurnOutcome, orchestrator: &WorkflowOrchestrator) {
    let badge = match outcome.mode {
        WorkflowMode::Plan => style("PLAN").magenta().bold(),
        WorkflowMode::Action => style("ACTION").green().bold(),
        WorkflowMode::Discussion => style("DISCUSSION").blue().bold(),
    };
    println!("{} (confidence {:.2})", badge, outcome.intent.confidence);
    println!();

    if outcome.success {
        println!("{}", outcome.reply);
    } else {
        println!("{} {}", style("×").red(), outcome.reply);
    }

    if let Some(plan) = &outcome.plan {
        println!();
        println!("{}", style("Plan:").bold());
        for (i, step) in plan.iter().enumerate() {
            println!("  {}. {}", i + 1, step);
        }
    }

    if !outcome.actions.is_empty() {
        println!();
        for action in &outcome.actions {
            println!("  {} {}", style("•").cyan(), action);
        }
    }

    for (title, items) in [("Suggestions:", &outcome.suggestions), ("Next steps:", &outcome.next_steps)] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}", style(title).bold());
        for item in items {
            println!("  {}", item);
        }
    }

    if let Some(version) = &outcome.version {
        println!();
        println!(
            "{} Saved version {} ({})",
            style("✓").green(),
            style(&version.name).bold(),
            &version.id[..8.min(version.id.len())]
        );
    }

    if outcome.needs_approval {
        println!();
        println!(
            "Run {} to implement this plan or {} to discard it.",
            style(format!("forge approve {}", orchestrator.project_id())).cyan(),
            style(format!("forge reject {}", orchestrator.project_id())).cyan()
        );
    }
}

fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageAttachment>> {
    paths.iter().map(|path| load_image(path)).collect()
}

fn load_image(path: &Path) -> Result<ImageAttachment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let Some(mime_type) = ImageAttachment::mime_for_extension(ext) else {
        bail!("Unsupported image type: {}", path.display());
    };
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(ImageAttachment::from_bytes(mime_type, &bytes))
}
