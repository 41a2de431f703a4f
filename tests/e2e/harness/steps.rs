use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Model script (queued, consumed by the next generation call)
    ModelReplies { text: String },
    ModelFails { reason: String },

    // User actions
    UserSays { text: String },
    UserStartsProject { text: String },
    UserDiscusses { text: String },
    UserApproves,
    UserRejects,
    UserSavesVersion { name: String },
    UserRestoresVersion { index: usize },
    UserUndoes,

    // Time control
    WaitHours { hours: u64 },
    WaitDays { days: u64 },

    // Maintenance
    EvictIdleContexts,

    // Failure simulation
    Crash,
    Restart,

    // Assertions (can be interspersed)
    Assert { assertion: Assertion },
}
