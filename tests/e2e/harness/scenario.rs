use super::assertions::Assertion;
use super::backend::fenced;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use forge_core::{FileTree, WorkflowMode};

/// Fluent DSL for building conversation scenarios
pub struct Scenario {
    name: String,
    initial_files: FileTree,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initial_files: FileTree::new(),
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Add a file to the project before the first turn
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.initial_files
            .insert(path.to_string(), content.to_string());
        self
    }

    /// Seed the usual three-file starter template
    pub fn with_starter_template(self) -> Self {
        self.with_file("index.html", "<!DOCTYPE html><html><body><h1>Hello</h1><button>Go</button></body></html>")
            .with_file("styles/style.css", "h1 { color: black; } button { color: blue; }")
            .with_file("scripts/app.js", "console.log('ready');")
    }

    // ===== Model script =====

    /// Queue a raw model reply
    pub fn model_replies(mut self, text: &str) -> Self {
        self.steps.push(ScenarioStep::ModelReplies {
            text: text.to_string(),
        });
        self
    }

    /// Queue a well-formed fenced reply with file edits (`None` deletes)
    pub fn model_edits(self, message: &str, changes: &[(&str, Option<&str>)]) -> Self {
        let changes: serde_json::Map<String, serde_json::Value> = changes
            .iter()
            .map(|(path, content)| {
                let value = match content {
                    Some(c) => serde_json::Value::String(c.to_string()),
                    None => serde_json::Value::Null,
                };
                (path.to_string(), value)
            })
            .collect();
        let body = serde_json::json!({ "message": message, "file_changes": changes });
        self.model_replies(&fenced(&body))
    }

    /// Queue a well-formed fenced reply carrying a plan
    pub fn model_plans(self, message: &str, steps: &[&str]) -> Self {
        let body = serde_json::json!({ "message": message, "plan": steps });
        self.model_replies(&fenced(&body))
    }

    /// Queue a transport failure
    pub fn model_fails(mut self, reason: &str) -> Self {
        self.steps.push(ScenarioStep::ModelFails {
            reason: reason.to_string(),
        });
        self
    }

    // ===== User actions =====

    /// User sends a message; the classifier picks the mode
    pub fn user_says(mut self, text: &str) -> Self {
        self.steps.push(ScenarioStep::UserSays {
            text: text.to_string(),
        });
        self
    }

    /// User's first message on a fresh project (template replaced)
    pub fn user_starts_project(mut self, text: &str) -> Self {
        self.steps.push(ScenarioStep::UserStartsProject {
            text: text.to_string(),
        });
        self
    }

    /// User forces a discussion turn
    pub fn user_discusses(mut self, text: &str) -> Self {
        self.steps.push(ScenarioStep::UserDiscusses {
            text: text.to_string(),
        });
        self
    }

    /// User approves the pending plan (runs the implementing turn)
    pub fn user_approves(mut self) -> Self {
        self.steps.push(ScenarioStep::UserApproves);
        self
    }

    pub fn user_rejects(mut self) -> Self {
        self.steps.push(ScenarioStep::UserRejects);
        self
    }

    pub fn user_saves_version(mut self, name: &str) -> Self {
        self.steps.push(ScenarioStep::UserSavesVersion {
            name: name.to_string(),
        });
        self
    }

    /// Restore by position in the newest-first version list
    pub fn user_restores_version(mut self, index: usize) -> Self {
        self.steps.push(ScenarioStep::UserRestoresVersion { index });
        self
    }

    pub fn user_undoes(mut self) -> Self {
        self.steps.push(ScenarioStep::UserUndoes);
        self
    }

    // ===== Time control =====

    pub fn wait_hours(mut self, hours: u64) -> Self {
        self.steps.push(ScenarioStep::WaitHours { hours });
        self
    }

    pub fn wait_days(mut self, days: u64) -> Self {
        self.steps.push(ScenarioStep::WaitDays { days });
        self
    }

    // ===== Maintenance and failures =====

    pub fn evict_idle_contexts(mut self) -> Self {
        self.steps.push(ScenarioStep::EvictIdleContexts);
        self
    }

    /// Drop everything in memory without any shutdown
    pub fn crash(mut self) -> Self {
        self.steps.push(ScenarioStep::Crash);
        self
    }

    /// Reopen the workspace from disk
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    // ===== Assertions =====

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    pub fn assert_last_mode(self, mode: WorkflowMode) -> Self {
        self.assert(Assertion::LastMode(mode))
    }

    pub fn assert_success(self) -> Self {
        self.assert(Assertion::LastTurnSucceeded)
    }

    pub fn assert_failure(self) -> Self {
        self.assert(Assertion::LastTurnFailed)
    }

    pub fn assert_reply_contains(self, text: &str) -> Self {
        self.assert(Assertion::LastReplyContains(text.to_string()))
    }

    pub fn assert_mode(self, mode: WorkflowMode) -> Self {
        self.assert(Assertion::Mode(mode))
    }

    pub fn assert_awaiting_approval(self) -> Self {
        self.assert(Assertion::AwaitingApproval)
    }

    pub fn assert_file_contains(self, path: &str, content: &str) -> Self {
        self.assert(Assertion::FileContains {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    pub fn assert_no_file(self, path: &str) -> Self {
        self.assert(Assertion::NoFile {
            path: path.to_string(),
        })
    }

    pub fn assert_file_count(self, count: usize) -> Self {
        self.assert(Assertion::FileCount(count))
    }

    pub fn assert_version_count(self, count: usize) -> Self {
        self.assert(Assertion::VersionCount(count))
    }

    pub fn assert_message_count(self, count: usize) -> Self {
        self.assert(Assertion::MessageCount(count))
    }

    pub fn assert_last_prompt_contains(self, text: &str) -> Self {
        self.assert(Assertion::LastPromptContains(text.to_string()))
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(self.initial_files.clone()) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}
