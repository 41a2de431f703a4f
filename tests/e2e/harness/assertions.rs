use anyhow::Result;
use forge_core::{WorkflowMode, WorkflowOrchestrator};

/// Declarative assertions on pipeline state
pub enum Assertion {
    // Last turn
    LastMode(WorkflowMode),
    LastTurnSucceeded,
    LastTurnFailed,
    LastReplyContains(String),
    LastPlanLen(usize),
    LastActionsLen(usize),
    LastTurnVersioned,
    LastTurnNotVersioned,

    // Workflow
    Mode(WorkflowMode),
    AwaitingApproval,
    NotAwaitingApproval,
    LastCommandRejected,

    // Files
    FileContains { path: String, content: String },
    NoFile { path: String },
    FileCount(usize),

    // Versions
    VersionCount(usize),
    LatestVersionNameContains(String),

    // Memory
    MessageCount(usize),
    ContextEvicted,
    GoalRecorded(String),
    SummaryContains(String),

    // Prompts sent to the model
    LastPromptContains(String),
    LastSystemInstructionContains(String),
    RequestCount(usize),

    // Custom (takes mutable reference to allow mutations)
    Custom(Box<dyn Fn(&mut WorkflowOrchestrator) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LastMode(m) => write!(f, "LastMode({})", m),
            Self::LastTurnSucceeded => write!(f, "LastTurnSucceeded"),
            Self::LastTurnFailed => write!(f, "LastTurnFailed"),
            Self::LastReplyContains(s) => write!(f, "LastReplyContains({:?})", s),
            Self::LastPlanLen(n) => write!(f, "LastPlanLen({})", n),
            Self::LastActionsLen(n) => write!(f, "LastActionsLen({})", n),
            Self::LastTurnVersioned => write!(f, "LastTurnVersioned"),
            Self::LastTurnNotVersioned => write!(f, "LastTurnNotVersioned"),
            Self::Mode(m) => write!(f, "Mode({})", m),
            Self::AwaitingApproval => write!(f, "AwaitingApproval"),
            Self::NotAwaitingApproval => write!(f, "NotAwaitingApproval"),
            Self::LastCommandRejected => write!(f, "LastCommandRejected"),
            Self::FileContains { path, content } => {
                write!(f, "FileContains {{ path: {:?}, content: {:?} }}", path, content)
            }
            Self::NoFile { path } => write!(f, "NoFile {{ path: {:?} }}", path),
            Self::FileCount(n) => write!(f, "FileCount({})", n),
            Self::VersionCount(n) => write!(f, "VersionCount({})", n),
            Self::LatestVersionNameContains(s) => write!(f, "LatestVersionNameContains({:?})", s),
            Self::MessageCount(n) => write!(f, "MessageCount({})", n),
            Self::ContextEvicted => write!(f, "ContextEvicted"),
            Self::GoalRecorded(s) => write!(f, "GoalRecorded({:?})", s),
            Self::SummaryContains(s) => write!(f, "SummaryContains({:?})", s),
            Self::LastPromptContains(s) => write!(f, "LastPromptContains({:?})", s),
            Self::LastSystemInstructionContains(s) => {
                write!(f, "LastSystemInstructionContains({:?})", s)
            }
            Self::RequestCount(n) => write!(f, "RequestCount({})", n),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
