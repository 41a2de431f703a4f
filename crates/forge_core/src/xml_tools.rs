//! XML-style file tools embedded in model replies.
//!
//! Besides the fenced JSON object, an edit reply may carry tool blocks:
//!
//! ```text
//! <write_to_file><path>a.css</path><content>body{}</content></write_to_file>
//! <replace_in_file><path>index.html</path><diff>
//! <<<<<<< SEARCH
//! <title>Old</title>
//! =======
//! <title>New</title>
//! >>>>>>> REPLACE
//! </diff></replace_in_file>
//! <delete_file><path>old.js</path></delete_file>
//! <read_file><path>index.html</path></read_file>
//! <list_files><path>scripts</path><recursive>true</recursive></list_files>
//! ```
//!
//! [`process_xml_tools`] runs the blocks in document order against a working
//! copy of the tree and reports the net edits plus one action line per tool.

use crate::file_tree::{apply_changes, list_files};
use crate::types::{FileChanges, FileTree};
use once_cell::sync::Lazy;
use regex::Regex;

static READ_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<read_file>\s*<path>([^<]*)</path>\s*</read_file>")
        .expect("read_file pattern is valid")
});

static WRITE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<write_to_file>\s*<path>([^<]*)</path>\s*<content>(.*?)</content>\s*</write_to_file>",
    )
    .expect("write_to_file pattern is valid")
});

static REPLACE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<replace_in_file>\s*<path>([^<]*)</path>\s*<diff>(.*?)</diff>\s*</replace_in_file>",
    )
    .expect("replace_in_file pattern is valid")
});

static DELETE_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<delete_file>\s*<path>([^<]*)</path>\s*</delete_file>")
        .expect("delete_file pattern is valid")
});

static LIST_FILES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<list_files>\s*<path>([^<]*)</path>(?:\s*<recursive>([^<]*)</recursive>)?\s*</list_files>",
    )
    .expect("list_files pattern is valid")
});

static SEARCH_REPLACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<<<<<<< SEARCH(.*?)=======(.*?)>>>>>>> REPLACE")
        .expect("search/replace pattern is valid")
});

/// One SEARCH/REPLACE pair from a `<diff>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReplace {
    /// Text to find (trimmed).
    pub search: String,
    /// Text to put in its place (trimmed).
    pub replace: String,
}

/// A tool block found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlTool {
    /// `<read_file>`: reported only.
    ReadFile { path: String },
    /// `<write_to_file>`: full content of a new or replaced file.
    WriteToFile { path: String, content: String },
    /// `<replace_in_file>`: ordered SEARCH/REPLACE edits on one file.
    ReplaceInFile { path: String, edits: Vec<SearchReplace> },
    /// `<delete_file>`.
    DeleteFile { path: String },
    /// `<list_files>`: reported only.
    ListFiles { path: String, recursive: bool },
}

/// Result of running the tool blocks of one reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlToolOutcome {
    /// Net edits (`None` deletes), relative to the input tree.
    pub changes: FileChanges,
    /// Input tree with `changes` applied.
    pub file_tree: FileTree,
    /// One human-readable line per tool run or skipped.
    pub actions: Vec<String>,
    /// SEARCH blocks that matched nothing, plus edits on missing files.
    pub misses: usize,
}

impl XmlToolOutcome {
    /// True when at least one file was written, edited or deleted.
    pub fn has_edits(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Extracts tool blocks in the order they appear.
pub fn parse_xml_tools(text: &str) -> Vec<XmlTool> {
    if !text.contains('<') {
        return Vec::new();
    }

    let mut found: Vec<(usize, XmlTool)> = Vec::new();

    for caps in READ_FILE_RE.captures_iter(text) {
        found.push((caps.get(0).map_or(0, |m| m.start()), XmlTool::ReadFile {
            path: caps[1].trim().to_string(),
        }));
    }
    for caps in WRITE_FILE_RE.captures_iter(text) {
        found.push((caps.get(0).map_or(0, |m| m.start()), XmlTool::WriteToFile {
            path: caps[1].trim().to_string(),
            content: caps[2].to_string(),
        }));
    }
    for caps in REPLACE_FILE_RE.captures_iter(text) {
        let edits = SEARCH_REPLACE_RE
            .captures_iter(&caps[2])
            .map(|block| SearchReplace {
                search: block[1].trim().to_string(),
                replace: block[2].trim().to_string(),
            })
            .collect();
        found.push((caps.get(0).map_or(0, |m| m.start()), XmlTool::ReplaceInFile {
            path: caps[1].trim().to_string(),
            edits,
        }));
    }
    for caps in DELETE_FILE_RE.captures_iter(text) {
        found.push((caps.get(0).map_or(0, |m| m.start()), XmlTool::DeleteFile {
            path: caps[1].trim().to_string(),
        }));
    }
    for caps in LIST_FILES_RE.captures_iter(text) {
        let recursive = caps
            .get(2)
            .map_or(false, |m| m.as_str().trim().eq_ignore_ascii_case("true"));
        found.push((caps.get(0).map_or(0, |m| m.start()), XmlTool::ListFiles {
            path: caps[1].trim().to_string(),
            recursive,
        }));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, tool)| tool).collect()
}

/// Runs every tool block in `text` against `tree`.
///
/// Edits apply in document order, so a replace after a write sees the
/// written content. A SEARCH block that does not occur in the file is
/// skipped and counted in `misses`; the other blocks of the same diff still
/// apply. Only the first occurrence of a SEARCH text is replaced.
pub fn process_xml_tools(text: &str, tree: &FileTree) -> XmlToolOutcome {
    let mut working = tree.clone();
    let mut outcome = XmlToolOutcome::default();

    for tool in parse_xml_tools(text) {
        match tool {
            XmlTool::ReadFile { path } => {
                if working.contains_key(&path) {
                    outcome.actions.push(format!("Read file: {}", path));
                } else {
                    outcome.actions.push(format!("File not found: {}", path));
                }
            }
            XmlTool::WriteToFile { path, content } => {
                if path.is_empty() {
                    tracing::warn!("write_to_file without a path, skipping");
                    continue;
                }
                tracing::debug!(path = %path, chars = content.len(), "write_to_file");
                outcome.actions.push(format!("Wrote file: {}", path));
                working.insert(path, content);
            }
            XmlTool::ReplaceInFile { path, edits } => {
                replace_in_file(&mut working, &path, &edits, &mut outcome);
            }
            XmlTool::DeleteFile { path } => {
                if working.remove(&path).is_some() {
                    outcome.actions.push(format!("Deleted file: {}", path));
                } else {
                    outcome.actions.push(format!("File not found: {}", path));
                }
            }
            XmlTool::ListFiles { path, recursive } => {
                let entries = list_files(&working, &path, recursive);
                outcome
                    .actions
                    .push(format!("Listed files in: {} ({} files)", path, entries.len()));
            }
        }
    }

    outcome.changes = net_changes(tree, &working);
    outcome.file_tree = apply_changes(tree, &outcome.changes);
    outcome
}

fn replace_in_file(
    working: &mut FileTree,
    path: &str,
    edits: &[SearchReplace],
    outcome: &mut XmlToolOutcome,
) {
    let Some(content) = working.get_mut(path) else {
        tracing::warn!(path, "replace_in_file on a missing file");
        outcome.misses += 1;
        outcome.actions.push(format!("File not found: {}", path));
        return;
    };

    let mut applied = 0;
    for edit in edits {
        if edit.search.is_empty() || !content.contains(&edit.search) {
            tracing::warn!(path, "search text not found, block skipped");
            outcome.misses += 1;
            outcome.actions.push(format!("Search text not found in: {}", path));
            continue;
        }
        *content = content.replacen(&edit.search, &edit.replace, 1);
        applied += 1;
    }
    if applied > 0 {
        outcome.actions.push(format!("Replaced content in: {}", path));
    }
}

/// Edits turning `before` into `after`.
fn net_changes(before: &FileTree, after: &FileTree) -> FileChanges {
    let mut changes = FileChanges::new();
    for (path, content) in after {
        if before.get(path) != Some(content) {
            changes.insert(path.clone(), Some(content.clone()));
        }
    }
    for path in before.keys() {
        if !after.contains_key(path) {
            changes.insert(path.clone(), None);
        }
    }
    changes
}
