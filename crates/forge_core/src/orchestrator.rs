//! Turn handling.
//!
//! [`WorkflowOrchestrator`] owns one project's pipeline state (file tree,
//! workflow state, conversation memory, versions, undo history) and handles
//! a user turn end to end:
//!
//! classify → prompt → generate → parse → apply → snapshot → remember.
//!
//! A turn never returns an error. Backend and parsing failures become an
//! unsuccessful [`TurnOutcome`] carrying a user-facing reply.

use crate::classification::{classify_intent, IntentAnalysis};
use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::extraction::{
    extract_next_steps, extract_plan, extract_suggestions, FALLBACK_PLAN_STEPS,
};
use crate::file_tree::TreeHistory;
use crate::generation::{GenerationBackend, PromptBuilder};
use crate::memory::ConversationStore;
use crate::response::parse_response;
use crate::types::{FileChanges, FileTree, ImageAttachment, Message, Version, WorkflowMode};
use crate::versioning::{SnapshotLabel, VersionHistory, VersionSnapshotter};
use crate::workflow::{transition, WorkflowEffect, WorkflowEvent, WorkflowState};
use crate::xml_tools::process_xml_tools;
use crate::SharedTimeProvider;
use serde::Serialize;
use std::sync::Arc;

/// Reply used when an edit turn fails before a response is available.
pub const GENERIC_ERROR_REPLY: &str = "Something went wrong while running that request. Please try again.";

const PLAN_ERROR_REPLY: &str = "I couldn't create a plan. Let's try a simpler approach.";

const DISCUSSION_ERROR_REPLY: &str = "I can help with web development, building applications, \
     technical explanations and more. What would you like to know?";

/// Turn text submitted after a plan is approved.
pub const APPROVED_PLAN_FOLLOW_UP: &str = "Implement the approved plan.";

/// One user turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnInput {
    /// What the user typed.
    pub text: String,
    /// Inline images.
    pub images: Vec<ImageAttachment>,
    /// Skip classification and answer as a discussion.
    pub force_discussion: bool,
    /// First message of a fresh project: edits replace the template tree.
    pub is_first_message: bool,
}

impl TurnInput {
    /// A plain text turn.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Attaches images.
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// Forces a discussion turn.
    pub fn discussion(mut self) -> Self {
        self.force_discussion = true;
        self
    }

    /// Marks the turn as the project's first message.
    pub fn first_message(mut self) -> Self {
        self.is_first_message = true;
        self
    }
}

/// What a turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Reply to show the user.
    pub reply: String,
    /// Mode the turn ran in.
    pub mode: WorkflowMode,
    /// False when the backend or parser failed.
    pub success: bool,
    /// Classifier output behind `mode`.
    pub intent: IntentAnalysis,
    /// Proposed plan (plan turns).
    pub plan: Option<Vec<String>>,
    /// Whether the plan waits for approval.
    pub needs_approval: bool,
    /// Edits applied this turn.
    pub file_changes: Option<FileChanges>,
    /// Human-readable list of applied edits.
    pub actions: Vec<String>,
    /// Suggestions found in a discussion reply.
    pub suggestions: Vec<String>,
    /// Next steps found in a discussion reply.
    pub next_steps: Vec<String>,
    /// Version recorded this turn, if the change was significant.
    pub version: Option<Version>,
}

impl TurnOutcome {
    fn new(mode: WorkflowMode, intent: IntentAnalysis, reply: impl Into<String>, success: bool) -> Self {
        Self {
            reply: reply.into(),
            mode,
            success,
            intent,
            plan: None,
            needs_approval: false,
            file_changes: None,
            actions: Vec::new(),
            suggestions: Vec::new(),
            next_steps: Vec::new(),
            version: None,
        }
    }
}

/// Assembles a [`WorkflowOrchestrator`], optionally from saved state.
pub struct OrchestratorBuilder {
    project_id: String,
    file_tree: FileTree,
    config: Config,
    backend: Box<dyn GenerationBackend>,
    memory: Option<ConversationStore>,
    versions: Vec<Version>,
    state: WorkflowState,
    time_provider: Option<SharedTimeProvider>,
}

impl OrchestratorBuilder {
    /// Uses an existing (possibly persisted) memory store.
    pub fn memory(mut self, memory: ConversationStore) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Restores saved versions, newest first.
    pub fn versions(mut self, versions: Vec<Version>) -> Self {
        self.versions = versions;
        self
    }

    /// Restores a saved workflow state.
    pub fn state(mut self, state: WorkflowState) -> Self {
        self.state = state;
        self
    }

    /// Uses `provider` instead of system time everywhere.
    pub fn time_provider(mut self, provider: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Builds the orchestrator.
    ///
    /// A project without saved versions gets an initial "Project created"
    /// version, and a project without a memory context gets a fresh one.
    pub fn build(self) -> WorkflowOrchestrator {
        let mut memory = self
            .memory
            .unwrap_or_else(|| ConversationStore::new(self.config.memory.clone()));
        let mut snapshotter = VersionSnapshotter::new(self.config.versioning.clone());
        if let Some(provider) = &self.time_provider {
            memory.set_time_provider(provider.clone());
            snapshotter.set_time_provider(provider.clone());
        }

        if memory.contains(&self.project_id) {
            memory.update_file_tree(&self.project_id, self.file_tree.clone());
        } else {
            memory.initialize(&self.project_id, self.file_tree.clone(), Vec::new());
        }

        let mut versions =
            VersionHistory::from_versions(self.versions, self.config.versioning.max_versions);
        if versions.is_empty() {
            versions.record(snapshotter.initial_snapshot(&self.file_tree));
        }

        WorkflowOrchestrator {
            prompts: PromptBuilder::new(self.config.workflow.clone(), self.config.generation.clone()),
            history: TreeHistory::new(self.file_tree.clone()),
            project_id: self.project_id,
            file_tree: self.file_tree,
            backend: self.backend,
            memory,
            snapshotter,
            versions,
            state: self.state,
        }
    }
}

/// Drives one project's conversation through the pipeline.
pub struct WorkflowOrchestrator {
    project_id: String,
    file_tree: FileTree,
    backend: Box<dyn GenerationBackend>,
    prompts: PromptBuilder,
    memory: ConversationStore,
    snapshotter: VersionSnapshotter,
    versions: VersionHistory,
    history: TreeHistory,
    state: WorkflowState,
}

impl WorkflowOrchestrator {
    /// Orchestrator for a fresh project with default memory and no history.
    pub fn new(
        project_id: impl Into<String>,
        file_tree: FileTree,
        config: Config,
        backend: Box<dyn GenerationBackend>,
    ) -> Self {
        Self::builder(project_id, file_tree, config, backend).build()
    }

    /// Starts a builder.
    pub fn builder(
        project_id: impl Into<String>,
        file_tree: FileTree,
        config: Config,
        backend: Box<dyn GenerationBackend>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            project_id: project_id.into(),
            file_tree,
            config,
            backend,
            memory: None,
            versions: Vec::new(),
            state: WorkflowState::default(),
            time_provider: None,
        }
    }

    /// Handles one user turn.
    pub fn handle_turn(&mut self, input: TurnInput) -> TurnOutcome {
        let intent = if input.force_discussion {
            IntentAnalysis::forced_discussion()
        } else {
            classify_intent(&input.text)
        };
        tracing::info!(
            project = %self.project_id,
            mode = %intent.mode,
            confidence = intent.confidence,
            complex = intent.is_complex,
            "handling turn"
        );

        match intent.mode {
            WorkflowMode::Plan => self.plan_turn(input, intent),
            WorkflowMode::Action => self.action_turn(input, intent),
            WorkflowMode::Discussion => self.discussion_turn(input, intent),
        }
    }

    /// Approves the pending plan.
    ///
    /// Returns the resulting effects; the caller is expected to follow up
    /// with [`execute_approved_plan`](Self::execute_approved_plan) or its own
    /// turn.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` when no plan is pending.
    pub fn approve_plan(&mut self) -> Result<Vec<WorkflowEffect>> {
        let (next, effects) = transition(&self.state, WorkflowEvent::Approve)?;
        self.state = next;
        tracing::info!(project = %self.project_id, "plan approved");
        Ok(effects)
    }

    /// Approves the pending plan and immediately runs the implementing turn.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` when no plan is pending.
    pub fn execute_approved_plan(&mut self) -> Result<TurnOutcome> {
        let effects = self.approve_plan()?;
        if !effects.contains(&WorkflowEffect::ExecuteApprovedPlan) {
            return Err(ForgeError::InvalidStateTransition {
                from: self.state.mode.to_string(),
                event: "execute".to_string(),
            });
        }
        let intent = IntentAnalysis {
            mode: WorkflowMode::Action,
            requires_plan: false,
            is_complex: true,
            confidence: 1.0,
            scores: Default::default(),
        };
        Ok(self.action_turn(TurnInput::new(APPROVED_PLAN_FOLLOW_UP), intent))
    }

    /// Discards the pending plan.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` outside planning.
    pub fn reject_plan(&mut self) -> Result<()> {
        let (next, _) = transition(&self.state, WorkflowEvent::Reject)?;
        self.state = next;
        tracing::info!(project = %self.project_id, "plan rejected");
        Ok(())
    }

    /// Returns the workflow to its initial state.
    pub fn reset_workflow(&mut self) {
        self.advance(WorkflowEvent::Reset);
    }

    /// Records the current tree as a named version.
    pub fn save_version(&mut self, name: &str) -> &Version {
        let previous = self
            .versions
            .latest()
            .map(|v| v.files.clone())
            .unwrap_or_default();
        let version = self.snapshotter.create_snapshot(
            &previous,
            &self.file_tree,
            &SnapshotLabel::Manual(name.to_string()),
            self.versions.next_sequence(),
        );
        tracing::info!(project = %self.project_id, version = %version.id, "saved version");
        self.versions.record(version);
        // just recorded, so present
        &self.versions.versions()[0]
    }

    /// Replaces the current tree with a saved version's tree.
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` for an unknown id.
    pub fn restore_version(&mut self, version_id: &str) -> Result<&FileTree> {
        let files = self
            .versions
            .find(version_id)
            .map(|v| v.files.clone())
            .ok_or_else(|| ForgeError::VersionNotFound(version_id.to_string()))?;
        tracing::info!(project = %self.project_id, version = version_id, "restoring version");
        self.set_tree(files);
        Ok(&self.file_tree)
    }

    /// Steps the tree back one change.
    pub fn undo(&mut self) -> Option<&FileTree> {
        let tree = self.history.undo()?.clone();
        self.file_tree = tree;
        self.memory.update_file_tree(&self.project_id, self.file_tree.clone());
        Some(&self.file_tree)
    }

    /// Steps the tree forward one change.
    pub fn redo(&mut self) -> Option<&FileTree> {
        let tree = self.history.redo()?.clone();
        self.file_tree = tree;
        self.memory.update_file_tree(&self.project_id, self.file_tree.clone());
        Some(&self.file_tree)
    }

    /// Project this orchestrator drives.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current tree.
    pub fn file_tree(&self) -> &FileTree {
        &self.file_tree
    }

    /// Current workflow state.
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Versions, newest first.
    pub fn versions(&self) -> &[Version] {
        self.versions.versions()
    }

    /// Conversation memory.
    pub fn memory(&self) -> &ConversationStore {
        &self.memory
    }

    /// Mutable conversation memory (goals, preferences, eviction).
    pub fn memory_mut(&mut self) -> &mut ConversationStore {
        &mut self.memory
    }

    fn plan_turn(&mut self, input: TurnInput, intent: IntentAnalysis) -> TurnOutcome {
        self.advance(WorkflowEvent::BeginTurn(WorkflowMode::Plan));

        let prompt = self.prompts.plan_prompt(&input.text);
        let result = self.generate(prompt, input.images.clone());

        let outcome = match result {
            Ok(raw) => {
                let parsed = parse_response(&raw, &self.file_tree, false);
                if parsed.is_success() {
                    let plan = parsed
                        .plan()
                        .filter(|steps| !steps.is_empty())
                        .map(<[String]>::to_vec)
                        .unwrap_or_else(|| extract_plan(parsed.message()));
                    let reply = parsed.message().to_string();

                    self.advance(WorkflowEvent::PlanProposed(plan.clone()));
                    self.memory.add_goal(&self.project_id, &input.text);
                    self.remember_exchange(
                        &input,
                        Message::assistant(reply.clone()).with_plan(plan.clone()),
                    );

                    let mut outcome = TurnOutcome::new(WorkflowMode::Plan, intent, reply, true);
                    outcome.plan = Some(plan);
                    outcome.needs_approval = true;
                    outcome
                } else {
                    tracing::warn!(project = %self.project_id, "plan response could not be parsed");
                    self.plan_failure(intent)
                }
            }
            Err(e) => {
                tracing::warn!(project = %self.project_id, error = %e, "plan generation failed");
                self.plan_failure(intent)
            }
        };

        self.advance(WorkflowEvent::TurnCompleted(WorkflowMode::Plan));
        outcome
    }

    fn plan_failure(&self, intent: IntentAnalysis) -> TurnOutcome {
        let mut outcome = TurnOutcome::new(WorkflowMode::Plan, intent, PLAN_ERROR_REPLY, false);
        outcome.plan = Some(FALLBACK_PLAN_STEPS.iter().map(|s| s.to_string()).collect());
        outcome
    }

    fn action_turn(&mut self, input: TurnInput, intent: IntentAnalysis) -> TurnOutcome {
        let effects = self.advance(WorkflowEvent::BeginTurn(WorkflowMode::Action));
        let approved_plan = effects.into_iter().find_map(|effect| match effect {
            WorkflowEffect::RequestAction { approved_plan } => approved_plan,
            _ => None,
        });

        let prompt = self
            .prompts
            .action_prompt(&input.text, approved_plan.as_deref());
        let outcome = match self.generate(prompt, input.images.clone()) {
            Ok(raw) => self.apply_action_response(&raw, &input, intent),
            Err(e) => {
                tracing::warn!(project = %self.project_id, error = %e, "action generation failed");
                TurnOutcome::new(WorkflowMode::Action, intent, GENERIC_ERROR_REPLY, false)
            }
        };

        self.advance(WorkflowEvent::TurnCompleted(WorkflowMode::Action));
        outcome
    }

    fn apply_action_response(
        &mut self,
        raw: &str,
        input: &TurnInput,
        intent: IntentAnalysis,
    ) -> TurnOutcome {
        let parsed = parse_response(raw, &self.file_tree, input.is_first_message);
        if !parsed.is_success() {
            tracing::warn!(project = %self.project_id, "action response could not be parsed");
            return TurnOutcome::new(WorkflowMode::Action, intent, parsed.message(), false);
        }

        let reply = parsed.message().to_string();
        let mut outcome = TurnOutcome::new(WorkflowMode::Action, intent, reply.clone(), true);
        outcome.plan = parsed.plan().map(<[String]>::to_vec);

        let mut changes = parsed.file_changes().cloned().unwrap_or_default();
        let mut new_tree = parsed.file_tree().cloned();
        outcome.actions = changes
            .iter()
            .map(|(path, change)| match change {
                Some(_) => format!("Modified file: {}", path),
                None => format!("Deleted file: {}", path),
            })
            .collect();

        // tool blocks in the reply run on top of the JSON edits
        let base = new_tree.as_ref().unwrap_or(&self.file_tree);
        let tools = process_xml_tools(&reply, base);
        if tools.misses > 0 {
            tracing::warn!(project = %self.project_id, misses = tools.misses, "some file tool edits were skipped");
        }
        outcome.actions.extend(tools.actions.iter().cloned());
        if tools.has_edits() {
            changes.extend(tools.changes.clone());
            new_tree = Some(tools.file_tree);
        }

        let mut assistant = Message::assistant(reply);
        if let Some(new_tree) = new_tree {
            assistant = assistant.with_files(changes.keys().cloned().collect());
            outcome.version = self.commit_tree(new_tree, &input.text);
            outcome.file_changes = Some(changes);
        }

        self.remember_exchange(input, assistant);
        outcome
    }

    fn discussion_turn(&mut self, input: TurnInput, intent: IntentAnalysis) -> TurnOutcome {
        self.advance(WorkflowEvent::BeginTurn(WorkflowMode::Discussion));

        let prompt = self.prompts.discussion_prompt(&input.text);
        let outcome = match self.generate(prompt, input.images.clone()) {
            Ok(raw) => {
                // discussion turns never touch files
                let parsed = parse_response(&raw, &self.file_tree, false);
                let reply = parsed.message().to_string();
                let mut outcome = TurnOutcome::new(
                    WorkflowMode::Discussion,
                    intent,
                    reply.clone(),
                    parsed.is_success(),
                );
                if parsed.is_success() {
                    outcome.suggestions = extract_suggestions(&reply);
                    outcome.next_steps = extract_next_steps(&reply);
                    self.remember_exchange(&input, Message::assistant(reply));
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(project = %self.project_id, error = %e, "discussion generation failed");
                TurnOutcome::new(WorkflowMode::Discussion, intent, DISCUSSION_ERROR_REPLY, false)
            }
        };

        self.advance(WorkflowEvent::TurnCompleted(WorkflowMode::Discussion));
        outcome
    }

    /// Installs a new tree produced by a turn and snapshots it when the
    /// change is significant.
    fn commit_tree(&mut self, new_tree: FileTree, label: &str) -> Option<Version> {
        let old_tree = std::mem::replace(&mut self.file_tree, new_tree);
        self.history.push(self.file_tree.clone());
        self.memory
            .update_file_tree(&self.project_id, self.file_tree.clone());

        let auto_label = SnapshotLabel::Auto(label.to_string());
        let analysis = self
            .snapshotter
            .analyze_changes(&old_tree, &self.file_tree, label);
        tracing::debug!(
            change_type = %analysis.change_type,
            severity = %analysis.severity,
            files = analysis.total_changes(),
            "analyzed tree change"
        );
        if !self.snapshotter.should_snapshot(&analysis, &auto_label) {
            return None;
        }

        let version = self.snapshotter.create_snapshot(
            &old_tree,
            &self.file_tree,
            &auto_label,
            self.versions.next_sequence(),
        );
        tracing::info!(project = %self.project_id, name = %version.name, "recorded version");
        self.versions.record(version.clone());
        Some(version)
    }

    fn set_tree(&mut self, tree: FileTree) {
        self.file_tree = tree;
        self.history.push(self.file_tree.clone());
        self.memory
            .update_file_tree(&self.project_id, self.file_tree.clone());
    }

    fn generate(&self, prompt: String, images: Vec<ImageAttachment>) -> Result<String> {
        let context = self.memory.context_for_generation(&self.project_id);
        let system = self.prompts.system_instruction(&self.file_tree, &context);
        let request = self.prompts.request(system, prompt, images);
        self.backend.generate(&request)
    }

    fn remember_exchange(&mut self, input: &TurnInput, reply: Message) {
        let now = self.memory.now();
        let user = Message::user(input.text.clone())
            .with_images(input.images.clone())
            .at(now);
        self.memory.add_message(&self.project_id, user);
        self.memory.add_message(&self.project_id, reply.at(now));
    }

    fn advance(&mut self, event: WorkflowEvent) -> Vec<WorkflowEffect> {
        match transition(&self.state, event) {
            Ok((next, effects)) => {
                self.state = next;
                effects
            }
            Err(e) => {
                tracing::error!(project = %self.project_id, error = %e, "unexpected workflow transition");
                Vec::new()
            }
        }
    }
}
