//! User intent classification.
//!
//! Heuristic keyword scoring that decides whether a turn should produce a
//! plan, edit files directly, or just answer. There is no training and no
//! memory of past decisions: the same utterance always gets the same result.

use crate::types::WorkflowMode;
use serde::Serialize;

/// Phrases that suggest the user wants something new built.
const PLAN_KEYWORDS: &[&str] = &[
    "build",
    "create",
    "develop",
    "make",
    "construct",
    "implement",
    "add feature",
    "new project",
    "application",
    "system",
    "platform",
    "website",
    "app",
];

/// Phrases that suggest a direct edit.
const ACTION_KEYWORDS: &[&str] = &[
    "fix", "change", "update", "modify", "adjust", "move", "delete", "remove", "rename",
    "replace",
];

/// Phrases that suggest a question rather than a request.
const DISCUSSION_KEYWORDS: &[&str] = &[
    "explain",
    "how",
    "what is",
    "why",
    "difference",
    "help",
    "question",
    "understand",
];

/// Phrases that mark a request as a large project.
const COMPLEXITY_PHRASES: &[&str] = &[
    "multiple pages",
    "database",
    "authentication",
    "api",
    "integration",
    "dashboard",
    "complete system",
    "platform",
    "e-commerce",
    "blog",
    "portfolio",
];

/// Utterances longer than this many characters count as complex.
const COMPLEX_LENGTH: usize = 200;

/// Lowest confidence ever reported.
const MIN_CONFIDENCE: f64 = 0.3;

/// Plan keywords needed (exclusive) before a complex request is planned first.
const PLAN_THRESHOLD: u32 = 2;

/// Raw keyword hit counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntentScores {
    /// Plan keyword hits.
    pub plan: u32,
    /// Action keyword hits.
    pub action: u32,
    /// Discussion keyword hits.
    pub discussion: u32,
}

impl IntentScores {
    fn total(&self) -> u32 {
        self.plan + self.action + self.discussion
    }
}

/// Result of classifying one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntentAnalysis {
    /// Chosen handling mode.
    pub mode: WorkflowMode,
    /// The request mentions building something and is complex.
    pub requires_plan: bool,
    /// The request names a large-project phrase or is long.
    pub is_complex: bool,
    /// Winning score's share of all hits, never below 0.3.
    pub confidence: f64,
    /// Underlying counts.
    pub scores: IntentScores,
}

impl IntentAnalysis {
    /// Analysis used when the caller forces a discussion turn.
    pub fn forced_discussion() -> Self {
        Self {
            mode: WorkflowMode::Discussion,
            requires_plan: false,
            is_complex: false,
            confidence: 1.0,
            scores: IntentScores::default(),
        }
    }
}

/// Classifies a user utterance.
///
/// Discussion wins only when its score is strictly greater than both others.
/// Planning needs more than two plan hits on a complex request. Everything
/// else, ties included, is handled as a direct action.
pub fn classify_intent(utterance: &str) -> IntentAnalysis {
    let lower = utterance.to_lowercase();

    let scores = IntentScores {
        plan: count_hits(&lower, PLAN_KEYWORDS),
        action: count_hits(&lower, ACTION_KEYWORDS),
        discussion: count_hits(&lower, DISCUSSION_KEYWORDS),
    };
    let is_complex = is_complex_request(&lower, utterance);

    let (mode, winner) = if scores.discussion > scores.plan && scores.discussion > scores.action {
        (WorkflowMode::Discussion, scores.discussion)
    } else if scores.plan > PLAN_THRESHOLD && is_complex {
        (WorkflowMode::Plan, scores.plan)
    } else {
        (WorkflowMode::Action, scores.action)
    };

    let confidence = match scores.total() {
        0 => MIN_CONFIDENCE,
        total => (winner as f64 / total as f64).max(MIN_CONFIDENCE),
    };

    IntentAnalysis {
        mode,
        requires_plan: scores.plan > 0 && is_complex,
        is_complex,
        confidence,
        scores,
    }
}

/// Counts how many keywords occur at least once.
fn count_hits(message: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|k| message.contains(*k)).count() as u32
}

fn is_complex_request(lower: &str, original: &str) -> bool {
    COMPLEXITY_PHRASES.iter().any(|p| lower.contains(p))
        || original.chars().count() > COMPLEX_LENGTH
}
