//! Plan/act/discuss state machine.
//!
//! [`transition`] is a pure function from a state and an event to the next
//! state plus the effects the caller should carry out. The orchestrator owns
//! the state and performs the effects; nothing here talks to a backend.

use crate::error::{ForgeError, Result};
use crate::types::WorkflowMode;
use serde::{Deserialize, Serialize};

/// Persistent workflow state of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Current mode.
    pub mode: WorkflowMode,
    /// Plan waiting for approval or being executed.
    #[serde(default)]
    pub current_plan: Option<Vec<String>>,
    /// Whether `current_plan` was approved.
    #[serde(default)]
    pub plan_approved: bool,
    /// Turns executed since approval.
    #[serde(default)]
    pub execution_step: Option<u32>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            mode: WorkflowMode::Discussion,
            current_plan: None,
            plan_approved: false,
            execution_step: None,
        }
    }
}

impl WorkflowState {
    /// True when a plan is waiting for the user's decision.
    pub fn awaiting_approval(&self) -> bool {
        self.mode == WorkflowMode::Plan && self.current_plan.is_some() && !self.plan_approved
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// A user turn starts in the given mode.
    BeginTurn(WorkflowMode),
    /// The backend produced a plan.
    PlanProposed(Vec<String>),
    /// The user approved the pending plan.
    Approve,
    /// The user rejected the pending plan.
    Reject,
    /// A turn in the given mode finished, successfully or not.
    TurnCompleted(WorkflowMode),
    /// Forget everything.
    Reset,
}

impl WorkflowEvent {
    fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::BeginTurn(_) => "begin_turn",
            WorkflowEvent::PlanProposed(_) => "plan_proposed",
            WorkflowEvent::Approve => "approve",
            WorkflowEvent::Reject => "reject",
            WorkflowEvent::TurnCompleted(_) => "turn_completed",
            WorkflowEvent::Reset => "reset",
        }
    }
}

/// Work the caller must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEffect {
    /// Ask the backend for a plan.
    RequestPlan,
    /// Show the plan and wait for approve/reject.
    AwaitApproval,
    /// Submit a follow-up turn that implements the approved plan.
    ExecuteApprovedPlan,
    /// Ask the backend for file edits, with the approved plan as context.
    RequestAction {
        /// Plan the edits should follow, if one was approved.
        approved_plan: Option<Vec<String>>,
    },
    /// Ask the backend for an explanation without edits.
    RequestDiscussion,
    /// The pending plan was discarded.
    PlanCleared,
}

/// Computes the next state for `event`.
///
/// # Errors
///
/// Returns `InvalidStateTransition` when approving without a pending plan,
/// rejecting outside planning, or proposing a plan outside planning.
pub fn transition(
    state: &WorkflowState,
    event: WorkflowEvent,
) -> Result<(WorkflowState, Vec<WorkflowEffect>)> {
    use WorkflowMode::*;

    let invalid = |event: &WorkflowEvent| ForgeError::InvalidStateTransition {
        from: state.mode.to_string(),
        event: event.name().to_string(),
    };

    let mut next = state.clone();
    let effects = match event {
        WorkflowEvent::BeginTurn(Plan) => {
            next.mode = Plan;
            next.current_plan = None;
            next.plan_approved = false;
            next.execution_step = None;
            vec![WorkflowEffect::RequestPlan]
        }
        WorkflowEvent::BeginTurn(Action) => {
            let approved_plan = if state.plan_approved {
                state.current_plan.clone()
            } else {
                None
            };
            next.mode = Action;
            if approved_plan.is_none() {
                next.current_plan = None;
                next.plan_approved = false;
            }
            vec![WorkflowEffect::RequestAction { approved_plan }]
        }
        WorkflowEvent::BeginTurn(Discussion) => vec![WorkflowEffect::RequestDiscussion],

        WorkflowEvent::PlanProposed(plan) => {
            if state.mode != Plan {
                return Err(invalid(&WorkflowEvent::PlanProposed(plan)));
            }
            next.current_plan = Some(plan);
            next.plan_approved = false;
            vec![WorkflowEffect::AwaitApproval]
        }

        WorkflowEvent::Approve => {
            if !state.awaiting_approval() {
                return Err(invalid(&WorkflowEvent::Approve));
            }
            next.mode = Action;
            next.plan_approved = true;
            next.execution_step = Some(0);
            vec![WorkflowEffect::ExecuteApprovedPlan]
        }

        WorkflowEvent::Reject => {
            if state.mode != Plan {
                return Err(invalid(&WorkflowEvent::Reject));
            }
            next.current_plan = None;
            next.plan_approved = false;
            vec![WorkflowEffect::PlanCleared]
        }

        // only an action turn consumes the plan; a question asked between
        // approval and execution leaves it in place
        WorkflowEvent::TurnCompleted(Action) => {
            next = WorkflowState::default();
            Vec::new()
        }
        WorkflowEvent::TurnCompleted(Plan) => {
            if state.current_plan.is_none() {
                next.mode = Discussion;
            }
            Vec::new()
        }
        WorkflowEvent::TurnCompleted(Discussion) => Vec::new(),

        WorkflowEvent::Reset => {
            let had_plan = state.current_plan.is_some();
            next = WorkflowState::default();
            if had_plan {
                vec![WorkflowEffect::PlanCleared]
            } else {
                Vec::new()
            }
        }
    };

    tracing::debug!(from = %state.mode, to = %next.mode, "workflow transition");
    Ok((next, effects))
}
