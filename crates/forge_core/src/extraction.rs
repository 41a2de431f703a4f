//! Scanning free-text replies for plan steps, suggestions and next steps.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBERED_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.").expect("numbered item pattern is valid"));

/// Steps used when a plan reply contains no list at all.
pub const DEFAULT_PLAN_STEPS: &[&str] = &[
    "Analyze requirements",
    "Create the basic structure",
    "Implement the features",
    "Test and refine",
];

/// Steps used when the plan request itself fails.
pub const FALLBACK_PLAN_STEPS: &[&str] = &[
    "Implement a basic solution",
    "Test the functionality",
    "Refine as needed",
];

/// Heading words that open a suggestions section.
const SUGGESTION_TRIGGERS: &[&str] = &["suggest", "recommend", "tip"];

/// Heading words that open a next-steps section.
const NEXT_STEP_TRIGGERS: &[&str] = &["next", "step"];

/// Whether a trimmed line is a bulleted or numbered list item.
pub fn is_list_item(trimmed: &str) -> bool {
    trimmed.starts_with("- ") || trimmed.starts_with("* ") || NUMBERED_ITEM_RE.is_match(trimmed)
}

/// Collects every list line of a reply as plan steps, falling back to
/// [`DEFAULT_PLAN_STEPS`] when the reply has none.
pub fn extract_plan(reply: &str) -> Vec<String> {
    let steps: Vec<String> = reply
        .lines()
        .map(str::trim)
        .filter(|line| is_list_item(line))
        .map(str::to_string)
        .collect();

    if steps.is_empty() {
        DEFAULT_PLAN_STEPS.iter().map(|s| s.to_string()).collect()
    } else {
        steps
    }
}

/// List items that follow a line mentioning suggestions or recommendations.
pub fn extract_suggestions(reply: &str) -> Vec<String> {
    items_after_trigger(reply, SUGGESTION_TRIGGERS)
}

/// List items that follow a line mentioning next steps.
pub fn extract_next_steps(reply: &str) -> Vec<String> {
    items_after_trigger(reply, NEXT_STEP_TRIGGERS)
}

/// Once a trigger line is seen, every later list item is collected. The
/// trigger line itself is never collected.
fn items_after_trigger(reply: &str, triggers: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for line in reply.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();

        if triggers.iter().any(|t| lower.contains(t)) {
            in_section = true;
            continue;
        }
        if in_section && is_list_item(trimmed) {
            items.push(trimmed.to_string());
        }
    }

    items
}
