//! appforge core library
//!
//! The pipeline behind a chat-driven web app builder:
//! - Intent classification (plan / act / discuss)
//! - Prompt construction and a pluggable generation backend
//! - Tolerant parsing of structured model output
//! - Pure file tree mutation with undo support
//! - Version snapshots of significant changes
//! - Bounded per-project conversation memory
//!
//! # Quick Start
//!
//! ```
//! use forge_core::{apply_changes, parse_response, FileTree};
//!
//! let raw = "```json\n{\"message\": \"Created\", \"file_changes\": {\"index.html\": \"<h1>Hi</h1>\"}}\n```";
//! let outcome = parse_response(raw, &FileTree::new(), true);
//!
//! assert!(outcome.is_success());
//! assert_eq!(outcome.message(), "Created");
//!
//! let tree = apply_changes(&FileTree::new(), outcome.file_changes().unwrap());
//! assert_eq!(tree["index.html"], "<h1>Hi</h1>");
//! ```
//!
//! # Handling Turns
//!
//! [`WorkflowOrchestrator`] runs whole user turns against any
//! [`GenerationBackend`]. Turns never fail: backend or parsing problems come
//! back as an unsuccessful [`TurnOutcome`] with a user-facing reply.
//!
//! ```
//! use forge_core::{
//!     Config, FileTree, GenerationBackend, GenerationRequest, TurnInput, WorkflowMode,
//!     WorkflowOrchestrator,
//! };
//!
//! struct Canned;
//!
//! impl GenerationBackend for Canned {
//!     fn generate(&self, _request: &GenerationRequest) -> forge_core::Result<String> {
//!         Ok("```json\n{\"message\": \"Made it red\", \"file_changes\": {\"style.css\": \"h1{color:red}\"}}\n```".into())
//!     }
//! }
//!
//! let mut orchestrator = WorkflowOrchestrator::new("demo", FileTree::new(), Config::default(), Box::new(Canned));
//! let outcome = orchestrator.handle_turn(TurnInput::new("change the heading color to red"));
//!
//! assert!(outcome.success);
//! assert_eq!(outcome.mode, WorkflowMode::Action);
//! assert_eq!(orchestrator.file_tree()["style.css"], "h1{color:red}");
//! ```

mod classification;
mod config;
mod error;
mod extraction;
mod file_tree;
mod generation;
mod memory;
mod orchestrator;
mod response;
mod storage;
mod types;
mod versioning;
mod workflow;
mod workspace;
mod xml_tools;

pub use classification::{classify_intent, IntentAnalysis, IntentScores};
pub use config::{Config, GenerationConfig, MemoryConfig, VersioningConfig, WorkflowConfig};
pub use error::{ForgeError, PersistError, Result};
pub use extraction::{
    extract_next_steps, extract_plan, extract_suggestions, is_list_item, DEFAULT_PLAN_STEPS,
    FALLBACK_PLAN_STEPS,
};
pub use file_tree::{apply_changes, diff_trees, invert_changes, list_files, TreeDiff, TreeHistory};
pub use generation::{
    build_system_instruction, GeminiBackend, GenerationBackend, GenerationRequest, PromptBuilder,
};
pub use memory::{
    ContextPersistence, ConversationContext, ConversationStore, EvictionReport, MemoryStats,
};
pub use orchestrator::{
    OrchestratorBuilder, TurnInput, TurnOutcome, WorkflowOrchestrator, APPROVED_PLAN_FOLLOW_UP,
    GENERIC_ERROR_REPLY,
};
pub use response::{
    parse_response, ParseOutcome, ParsedResponse, GENERIC_FAILURE_MESSAGE,
    RECOVERED_CHANGES_MESSAGE,
};
pub use storage::{LocalStore, CONVERSATIONS_KEY, PROJECTS_KEY};
pub use types::*;
pub use versioning::{
    ChangeAnalysis, SnapshotLabel, VersionHistory, VersionSnapshotter, INITIAL_VERSION_NAME,
};
pub use workflow::{transition, WorkflowEffect, WorkflowEvent, WorkflowState};
pub use workspace::{Workspace, FORGE_DIR};
pub use xml_tools::{
    parse_xml_tools, process_xml_tools, SearchReplace, XmlTool, XmlToolOutcome,
};

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Time provider trait for testing.
///
/// Allows injecting controlled time into the memory store, the snapshotter and
/// the orchestrator so idle eviction can be tested without waiting.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}

/// Shared handle to an injected clock.
pub type SharedTimeProvider = Arc<dyn TimeProvider>;

/// Current time from `provider`, or the system clock when none is set.
pub(crate) fn current_time(provider: Option<&SharedTimeProvider>) -> DateTime<Utc> {
    match provider {
        Some(provider) => DateTime::from_timestamp(provider.now(), 0).unwrap_or_else(Utc::now),
        None => Utc::now(),
    }
}
