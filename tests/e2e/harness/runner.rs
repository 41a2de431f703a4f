use super::assertions::Assertion;
use super::backend::ScriptedBackend;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use forge_core::{FileTree, TurnInput, TurnOutcome, WorkflowOrchestrator, Workspace};

const PROJECT_NAME: &str = "scenario";

/// Executes scenarios against a real on-disk workspace
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    forge: Option<Workspace>,
    orchestrator: Option<WorkflowOrchestrator>,
    project_id: String,
    backend: ScriptedBackend,
    clock: MockClock,
    crashed: bool,
    current_step: usize,
    last_outcome: Option<TurnOutcome>,
    last_error: Option<String>,
}

impl ScenarioRunner {
    /// Create a runner with a fresh workspace holding one project
    pub fn new(initial_files: FileTree) -> Result<Self> {
        let workspace = TestWorkspace::empty()?;
        let clock = MockClock::new();
        let backend = ScriptedBackend::default();

        let forge = workspace
            .init_forge()?
            .with_time_provider(clock.as_provider());
        let project = forge.create_project(PROJECT_NAME, initial_files)?;
        let orchestrator = forge.orchestrator_for(&project, Box::new(backend.clone()))?;

        Ok(Self {
            workspace,
            forge: Some(forge),
            orchestrator: Some(orchestrator),
            project_id: project.id,
            backend,
            clock,
            crashed: false,
            current_step: 0,
            last_outcome: None,
            last_error: None,
        })
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::ModelReplies { text } => {
                self.backend.push_reply(text);
                Ok(())
            }
            ScenarioStep::ModelFails { reason } => {
                self.backend.push_failure(reason);
                Ok(())
            }

            ScenarioStep::UserSays { text } => self.turn(TurnInput::new(text.as_str())),
            ScenarioStep::UserStartsProject { text } => {
                self.turn(TurnInput::new(text.as_str()).first_message())
            }
            ScenarioStep::UserDiscusses { text } => {
                self.turn(TurnInput::new(text.as_str()).discussion())
            }
            ScenarioStep::UserApproves => self.handle_approve(),
            ScenarioStep::UserRejects => self.handle_reject(),
            ScenarioStep::UserSavesVersion { name } => {
                self.orchestrator()?.save_version(name);
                self.persist()
            }
            ScenarioStep::UserRestoresVersion { index } => self.handle_restore(*index),
            ScenarioStep::UserUndoes => {
                self.orchestrator()?
                    .undo()
                    .ok_or_else(|| anyhow!("nothing to undo"))?;
                self.persist()
            }

            ScenarioStep::WaitHours { hours } => {
                self.clock.advance_hours(*hours);
                Ok(())
            }
            ScenarioStep::WaitDays { days } => {
                self.clock.advance_days(*days);
                Ok(())
            }

            ScenarioStep::EvictIdleContexts => {
                self.orchestrator()?.memory_mut().cleanup_old_contexts();
                Ok(())
            }

            ScenarioStep::Crash => self.handle_crash(),
            ScenarioStep::Restart => self.handle_restart(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn orchestrator(&mut self) -> Result<&mut WorkflowOrchestrator> {
        self.orchestrator
            .as_mut()
            .ok_or_else(|| anyhow!("orchestrator not available (crashed?)"))
    }

    fn forge(&self) -> Result<&Workspace> {
        self.forge
            .as_ref()
            .ok_or_else(|| anyhow!("workspace not available (crashed?)"))
    }

    /// Save the session the way the CLI does after every command
    fn persist(&mut self) -> Result<()> {
        let forge = self.forge()?;
        let orchestrator = self
            .orchestrator
            .as_ref()
            .ok_or_else(|| anyhow!("orchestrator not available"))?;
        forge.save_session(orchestrator)?;
        Ok(())
    }

    // ===== User action handlers =====

    fn turn(&mut self, input: TurnInput) -> Result<()> {
        let outcome = self.orchestrator()?.handle_turn(input);
        self.last_outcome = Some(outcome);
        self.persist()
    }

    fn handle_approve(&mut self) -> Result<()> {
        match self.orchestrator()?.execute_approved_plan() {
            Ok(outcome) => {
                self.last_outcome = Some(outcome);
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
        self.persist()
    }

    fn handle_reject(&mut self) -> Result<()> {
        match self.orchestrator()?.reject_plan() {
            Ok(()) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        self.persist()
    }

    fn handle_restore(&mut self, index: usize) -> Result<()> {
        let orchestrator = self.orchestrator()?;
        let id = orchestrator
            .versions()
            .get(index)
            .map(|v| v.id.clone())
            .ok_or_else(|| anyhow!("no version at index {}", index))?;
        orchestrator.restore_version(&id)?;
        self.persist()
    }

    // ===== Failure simulation =====

    fn handle_crash(&mut self) -> Result<()> {
        // the orchestrator holds a store handle, so it goes first
        self.orchestrator = None;
        self.forge = None;
        self.crashed = true;
        Ok(())
    }

    fn handle_restart(&mut self) -> Result<()> {
        if !self.crashed {
            bail!("Cannot restart - not crashed");
        }

        let forge = self
            .workspace
            .open_forge()?
            .with_time_provider(self.clock.as_provider());
        let project = forge.find_project(&self.project_id)?;
        let orchestrator = forge.orchestrator_for(&project, Box::new(self.backend.clone()))?;

        self.forge = Some(forge);
        self.orchestrator = Some(orchestrator);
        self.crashed = false;
        self.last_outcome = None;
        Ok(())
    }

    // ===== Assertions =====

    fn last_outcome(&self) -> Result<&TurnOutcome> {
        self.last_outcome
            .as_ref()
            .ok_or_else(|| anyhow!("no turn has run yet"))
    }

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        if let Assertion::Custom(check) = assertion {
            return check(self.orchestrator()?);
        }

        let orchestrator = self
            .orchestrator
            .as_ref()
            .ok_or_else(|| anyhow!("orchestrator not available"))?;
        let project_id = self.project_id.as_str();

        match assertion {
            Assertion::LastMode(mode) => {
                let outcome = self.last_outcome()?;
                ensure!(outcome.mode == *mode, "expected {} turn, got {}", mode, outcome.mode);
            }
            Assertion::LastTurnSucceeded => {
                let outcome = self.last_outcome()?;
                ensure!(outcome.success, "turn failed: {}", outcome.reply);
            }
            Assertion::LastTurnFailed => {
                let outcome = self.last_outcome()?;
                ensure!(!outcome.success, "turn unexpectedly succeeded: {}", outcome.reply);
            }
            Assertion::LastReplyContains(text) => {
                let outcome = self.last_outcome()?;
                ensure!(
                    outcome.reply.contains(text.as_str()),
                    "reply {:?} does not contain {:?}",
                    outcome.reply,
                    text
                );
            }
            Assertion::LastPlanLen(n) => {
                let len = self.last_outcome()?.plan.as_ref().map_or(0, Vec::len);
                ensure!(len == *n, "expected plan of {} steps, got {}", n, len);
            }
            Assertion::LastActionsLen(n) => {
                let len = self.last_outcome()?.actions.len();
                ensure!(len == *n, "expected {} file actions, got {}", n, len);
            }
            Assertion::LastTurnVersioned => {
                ensure!(self.last_outcome()?.version.is_some(), "no version recorded");
            }
            Assertion::LastTurnNotVersioned => {
                ensure!(self.last_outcome()?.version.is_none(), "unexpected version");
            }

            Assertion::Mode(mode) => {
                let actual = orchestrator.state().mode;
                ensure!(actual == *mode, "expected state {}, got {}", mode, actual);
            }
            Assertion::AwaitingApproval => {
                ensure!(orchestrator.state().awaiting_approval(), "no plan awaiting approval");
            }
            Assertion::NotAwaitingApproval => {
                ensure!(!orchestrator.state().awaiting_approval(), "plan still pending");
            }
            Assertion::LastCommandRejected => {
                ensure!(self.last_error.is_some(), "last command was accepted");
            }

            Assertion::FileContains { path, content } => {
                let actual = orchestrator
                    .file_tree()
                    .get(path)
                    .ok_or_else(|| anyhow!("file not found: {}", path))?;
                ensure!(
                    actual.contains(content.as_str()),
                    "{} does not contain {:?}",
                    path,
                    content
                );
            }
            Assertion::NoFile { path } => {
                ensure!(
                    !orchestrator.file_tree().contains_key(path),
                    "file unexpectedly present: {}",
                    path
                );
            }
            Assertion::FileCount(n) => {
                let len = orchestrator.file_tree().len();
                ensure!(len == *n, "expected {} files, got {}", n, len);
            }

            Assertion::VersionCount(n) => {
                let len = orchestrator.versions().len();
                ensure!(len == *n, "expected {} versions, got {}", n, len);
            }
            Assertion::LatestVersionNameContains(text) => {
                let name = orchestrator
                    .versions()
                    .first()
                    .map(|v| v.name.as_str())
                    .unwrap_or_default();
                ensure!(name.contains(text.as_str()), "latest version is {:?}", name);
            }

            Assertion::MessageCount(n) => {
                let len = orchestrator
                    .memory()
                    .peek(project_id)
                    .map_or(0, |c| c.messages.len());
                ensure!(len == *n, "expected {} messages, got {}", n, len);
            }
            Assertion::ContextEvicted => {
                ensure!(
                    !orchestrator.memory().contains(project_id),
                    "context still in memory"
                );
            }
            Assertion::GoalRecorded(goal) => {
                let context = orchestrator
                    .memory()
                    .peek(project_id)
                    .ok_or_else(|| anyhow!("no context"))?;
                ensure!(context.goals.contains(goal), "goals: {:?}", context.goals);
            }
            Assertion::SummaryContains(text) => {
                let context = orchestrator
                    .memory()
                    .peek(project_id)
                    .ok_or_else(|| anyhow!("no context"))?;
                ensure!(
                    context.summary.contains(text.as_str()),
                    "summary: {:?}",
                    context.summary
                );
            }

            Assertion::LastPromptContains(text) => {
                let requests = self.backend.requests();
                let last = requests.last().ok_or_else(|| anyhow!("no request sent"))?;
                ensure!(
                    last.prompt.contains(text.as_str()),
                    "prompt {:?} does not contain {:?}",
                    last.prompt,
                    text
                );
            }
            Assertion::LastSystemInstructionContains(text) => {
                let requests = self.backend.requests();
                let last = requests.last().ok_or_else(|| anyhow!("no request sent"))?;
                ensure!(
                    last.system_instruction.contains(text.as_str()),
                    "system instruction does not contain {:?}",
                    text
                );
            }
            Assertion::RequestCount(n) => {
                let len = self.backend.requests().len();
                ensure!(len == *n, "expected {} requests, got {}", n, len);
            }

            Assertion::Custom(_) => unreachable!("handled above"),
        }
        Ok(())
    }
}
