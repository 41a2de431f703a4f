//! CLI commands.

pub mod chat;
pub mod classify;
pub mod context;
pub mod gc;
pub mod init;
pub mod parse;
pub mod plan;
pub mod project;
pub mod versions;

use anyhow::Result;
use console::style;
use forge_core::{
    ForgeError, GeminiBackend, GenerationBackend, GenerationRequest, Workspace, WorkflowOrchestrator,
};

/// Opens the workspace at or above the current directory.
pub fn open_workspace() -> Result<Workspace> {
    Workspace::discover(".").map_err(with_hint)
}

/// Gemini backend configured from the workspace.
pub fn backend(workspace: &Workspace) -> Result<Box<dyn GenerationBackend>> {
    let backend = GeminiBackend::from_env(&workspace.config().generation).map_err(with_hint)?;
    tracing::debug!(model = backend.model(), "using gemini backend");
    Ok(Box::new(backend))
}

/// Converts a library error, appending its recovery hint when there is one.
pub fn with_hint(err: ForgeError) -> anyhow::Error {
    match err.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\n  {} {}", err, style("hint:").cyan(), hint),
        None => err.into(),
    }
}

/// Backend for commands that only touch stored state.
struct Offline;

impl GenerationBackend for Offline {
    fn generate(&self, _request: &GenerationRequest) -> forge_core::Result<String> {
        Err(ForgeError::Backend(
            "generation is not available for this command".to_string(),
        ))
    }
}

/// Restores a project's orchestrator without a model behind it.
pub fn offline_orchestrator(workspace: &Workspace, project: &str) -> Result<WorkflowOrchestrator> {
    let record = workspace.find_project(project).map_err(with_hint)?;
    Ok(workspace.orchestrator_for(&record, Box::new(Offline))?)
}
