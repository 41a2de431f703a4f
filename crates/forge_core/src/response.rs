//! Interpretation of raw model output.
//!
//! Models are asked to answer with a single ```` ```json ```` fenced object
//! carrying `message`, an optional `plan` and optional `file_changes`. In
//! practice the fence may be missing, unterminated (the output hit the token
//! limit) or hold invalid JSON. Parsing therefore degrades in tiers:
//!
//! 1. No fence: the whole text is a plain chat reply.
//! 2. Truncated object: cut back to the last balanced closing brace.
//! 3. Strict parse of the object.
//! 4. On failure, salvage the `file_changes` fragment and the `message` field
//!    independently.
//! 5. If nothing can be salvaged, report a generic failure.

use crate::file_tree::apply_changes;
use crate::types::{FileChanges, FileTree, DELETE_SENTINEL};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Reply shown to the user when a response cannot be interpreted at all.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't process the AI response. Please try again.";

/// Reply used when file changes were salvaged but the message was not.
pub const RECOVERED_CHANGES_MESSAGE: &str =
    "I applied the changes, but part of the response was malformed.";

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```json\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
});

static OPEN_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*)$").expect("open fence pattern is valid"));

static MESSAGE_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""message"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("message pattern is valid")
});

static FILE_CHANGES_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""file_changes"\s*:\s*\{"#).expect("key pattern is valid"));

/// A fully interpreted response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Chat reply.
    pub message: String,
    /// Proposed plan steps, if the model sent any.
    pub plan: Option<Vec<String>>,
    /// Normalized edits (`None` deletes). Absent when nothing usable was sent.
    pub file_changes: Option<FileChanges>,
    /// Tree after applying `file_changes`. Present exactly when they are.
    pub file_tree: Option<FileTree>,
}

/// Outcome of [`parse_response`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The response was understood, possibly after truncation repair.
    Parsed(ParsedResponse),
    /// The object was malformed but parts of it were salvaged.
    PartialRecovery {
        /// Salvaged or substitute chat reply.
        message: String,
        /// Salvaged edits.
        file_changes: Option<FileChanges>,
        /// Tree after applying the salvaged edits.
        file_tree: Option<FileTree>,
    },
    /// Nothing usable could be extracted.
    Failed {
        /// Technical description, for logs.
        reason: String,
    },
}

impl ParseOutcome {
    /// Message to show the user. Failures yield a generic apology.
    pub fn message(&self) -> &str {
        match self {
            ParseOutcome::Parsed(parsed) => &parsed.message,
            ParseOutcome::PartialRecovery { message, .. } => message,
            ParseOutcome::Failed { .. } => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// True unless parsing failed outright.
    pub fn is_success(&self) -> bool {
        !matches!(self, ParseOutcome::Failed { .. })
    }

    /// Plan steps, if any were parsed.
    pub fn plan(&self) -> Option<&[String]> {
        match self {
            ParseOutcome::Parsed(parsed) => parsed.plan.as_deref(),
            _ => None,
        }
    }

    /// Normalized edits, if any.
    pub fn file_changes(&self) -> Option<&FileChanges> {
        match self {
            ParseOutcome::Parsed(parsed) => parsed.file_changes.as_ref(),
            ParseOutcome::PartialRecovery { file_changes, .. } => file_changes.as_ref(),
            ParseOutcome::Failed { .. } => None,
        }
    }

    /// Resulting tree, if edits were applied.
    pub fn file_tree(&self) -> Option<&FileTree> {
        match self {
            ParseOutcome::Parsed(parsed) => parsed.file_tree.as_ref(),
            ParseOutcome::PartialRecovery { file_tree, .. } => file_tree.as_ref(),
            ParseOutcome::Failed { .. } => None,
        }
    }
}

/// Interprets raw model text against the project's current tree.
///
/// On the first message of a project the edits are applied to an empty tree
/// so that template files are replaced rather than merged.
pub fn parse_response(raw: &str, current_tree: &FileTree, is_first_message: bool) -> ParseOutcome {
    let Some(captured) = locate_fenced_json(raw) else {
        tracing::debug!("response has no json fence, treating as plain reply");
        return ParseOutcome::Parsed(ParsedResponse {
            message: raw.trim().to_string(),
            ..Default::default()
        });
    };

    let base = if is_first_message {
        FileTree::new()
    } else {
        current_tree.clone()
    };

    let mut candidate = captured.trim();
    if !candidate.ends_with('}') {
        match balanced_prefix(candidate) {
            Some(repaired) => {
                tracing::warn!(
                    dropped = candidate.len() - repaired.len(),
                    "repaired truncated response object"
                );
                candidate = repaired;
            }
            None => {
                tracing::warn!("response object is truncated with no balanced prefix");
                return match extract_message(candidate) {
                    Some(message) => ParseOutcome::PartialRecovery {
                        message,
                        file_changes: None,
                        file_tree: None,
                    },
                    None => ParseOutcome::Failed {
                        reason: "truncated response object without a message field".to_string(),
                    },
                };
            }
        }
    }

    match parse_object(candidate, &base) {
        Ok(parsed) => ParseOutcome::Parsed(parsed),
        Err(reason) => {
            tracing::warn!(%reason, "strict parse failed, attempting fragment recovery");
            recover_fragments(candidate, &base, reason)
        }
    }
}

/// Returns the text inside the json fence. An unterminated fence captures to
/// end of input.
fn locate_fenced_json(raw: &str) -> Option<&str> {
    FENCE_RE
        .captures(raw)
        .or_else(|| OPEN_FENCE_RE.captures(raw))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_object(text: &str, base: &FileTree) -> std::result::Result<ParsedResponse, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let Value::Object(object) = value else {
        return Err("response is not a JSON object".to_string());
    };

    let message = match object.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(_) => return Err("message field is not a string".to_string()),
        None => return Err("message field is missing".to_string()),
    };

    let plan = match object.get("plan") {
        Some(Value::Array(steps)) => Some(
            steps
                .iter()
                .filter_map(|step| step.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    };

    let (file_changes, file_tree) = match object.get("file_changes") {
        Some(Value::Object(raw_changes)) => changes_and_tree(raw_changes, base),
        Some(Value::Null) | None => (None, None),
        Some(_) => {
            tracing::warn!("file_changes is not an object, ignoring it");
            (None, None)
        }
    };

    Ok(ParsedResponse {
        message,
        plan,
        file_changes,
        file_tree,
    })
}

fn changes_and_tree(
    raw_changes: &Map<String, Value>,
    base: &FileTree,
) -> (Option<FileChanges>, Option<FileTree>) {
    let changes = normalize_changes(raw_changes);
    if changes.is_empty() {
        tracing::warn!("file_changes present but held no usable entries, tree left untouched");
        return (None, None);
    }
    let tree = apply_changes(base, &changes);
    (Some(changes), Some(tree))
}

/// Converts raw JSON entries into edits. `null` and the delete sentinel
/// remove a path; other strings write it. Everything else is skipped.
fn normalize_changes(raw_changes: &Map<String, Value>) -> FileChanges {
    let mut changes = FileChanges::new();
    for (path, value) in raw_changes {
        if path.is_empty() {
            tracing::warn!("skipping file change with empty path");
            continue;
        }
        match value {
            Value::Null => {
                changes.insert(path.clone(), None);
            }
            Value::String(s) if s == DELETE_SENTINEL => {
                changes.insert(path.clone(), None);
            }
            Value::String(content) => {
                changes.insert(path.clone(), Some(content.clone()));
            }
            other => {
                tracing::warn!(path = %path, kind = json_kind(other), "skipping non-string file content");
            }
        }
    }
    changes
}

fn recover_fragments(text: &str, base: &FileTree, reason: String) -> ParseOutcome {
    let changes = extract_file_changes(text);
    let message = extract_message(text);

    match (message, changes) {
        (None, None) => ParseOutcome::Failed { reason },
        (message, changes) => {
            let (file_changes, file_tree) = match changes {
                Some(raw_changes) => changes_and_tree(&raw_changes, base),
                None => (None, None),
            };
            let message = message.unwrap_or_else(|| {
                if file_changes.is_some() {
                    RECOVERED_CHANGES_MESSAGE.to_string()
                } else {
                    GENERIC_FAILURE_MESSAGE.to_string()
                }
            });
            ParseOutcome::PartialRecovery {
                message,
                file_changes,
                file_tree,
            }
        }
    }
}

/// Finds the `"file_changes": { ... }` fragment and parses it on its own.
fn extract_file_changes(text: &str) -> Option<Map<String, Value>> {
    let key = FILE_CHANGES_KEY_RE.find(text)?;
    let object_start = key.end() - 1;
    let fragment = balanced_prefix(&text[object_start..])?;
    match serde_json::from_str::<Value>(fragment) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Permissive `"message": "..."` extraction with JSON unescaping.
fn extract_message(text: &str) -> Option<String> {
    let escaped = MESSAGE_FIELD_RE.captures(text)?.get(1)?.as_str();
    let unescaped = serde_json::from_str::<String>(&format!("\"{}\"", escaped))
        .unwrap_or_else(|_| escaped.to_string());
    Some(unescaped)
}

/// Returns the longest prefix of `text` ending where the brace depth last
/// returned to zero. Braces inside JSON strings are ignored.
fn balanced_prefix(text: &str) -> Option<&str> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_balanced = None;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    last_balanced = Some(idx + 1);
                }
            }
            _ => {}
        }
    }

    last_balanced.map(|end| &text[..end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
