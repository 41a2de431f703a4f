//! Version snapshots of project file trees.
//!
//! After every applied edit the before/after trees are classified. Major
//! changes (and anything the user saves by hand) are recorded as immutable
//! full copies in a newest-first [`VersionHistory`].

use crate::config::VersioningConfig;
use crate::file_tree::diff_trees;
use crate::types::{ChangeType, FileTree, Severity, Version, VersionMetadata};
use crate::{current_time, SharedTimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const FIX_WORDS: &[&str] = &["fix", "bug", "error", "broken", "repair", "correct"];
const STYLE_WORDS: &[&str] = &["style", "color", "colour", "css", "design", "layout", "font", "theme"];
const REFACTOR_WORDS: &[&str] = &["refactor", "clean", "reorganize", "restructure", "rename", "simplify"];
const FEATURE_WORDS: &[&str] = &["add", "feature", "new", "implement", "create", "build"];

const STYLESHEET_EXTENSIONS: &[&str] = &[".css", ".scss", ".sass", ".less"];
const STRUCTURAL_FILES: &[&str] = &["package.json", "manifest.json"];

/// Name given to the first version of every project.
pub const INITIAL_VERSION_NAME: &str = "Project created";

/// Longest label excerpt used in an auto-generated version name.
const NAME_LABEL_CHARS: usize = 50;

/// What prompted a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLabel {
    /// Recorded by the pipeline; the text describes the request.
    Auto(String),
    /// Saved explicitly by the user; the text is the version name.
    Manual(String),
}

impl SnapshotLabel {
    /// The label text.
    pub fn text(&self) -> &str {
        match self {
            SnapshotLabel::Auto(text) | SnapshotLabel::Manual(text) => text,
        }
    }

    /// Whether the user asked for this snapshot.
    pub fn is_manual(&self) -> bool {
        matches!(self, SnapshotLabel::Manual(_))
    }
}

/// Classification of the difference between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAnalysis {
    /// Paths only in the new tree.
    pub added: Vec<String>,
    /// Paths only in the old tree.
    pub removed: Vec<String>,
    /// Paths whose content changed.
    pub modified: Vec<String>,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Significance.
    pub severity: Severity,
}

impl ChangeAnalysis {
    /// All changed paths, sorted.
    pub fn changed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .added
            .iter()
            .chain(&self.removed)
            .chain(&self.modified)
            .cloned()
            .collect();
        files.sort();
        files
    }

    /// Number of changed paths.
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// True when the trees were identical.
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Classifies tree changes and produces versions.
pub struct VersionSnapshotter {
    config: VersioningConfig,
    time_provider: Option<SharedTimeProvider>,
}

impl VersionSnapshotter {
    /// Creates a snapshotter using system time.
    pub fn new(config: VersioningConfig) -> Self {
        Self {
            config,
            time_provider: None,
        }
    }

    /// Uses `provider` instead of system time for version timestamps.
    pub fn with_time_provider(
        mut self,
        provider: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    pub(crate) fn set_time_provider(&mut self, provider: SharedTimeProvider) {
        self.time_provider = Some(provider);
    }

    /// Returns the active policy.
    pub fn config(&self) -> &VersioningConfig {
        &self.config
    }

    /// Classifies the change from `old` to `new` described by `label`.
    pub fn analyze_changes(&self, old: &FileTree, new: &FileTree, label: &str) -> ChangeAnalysis {
        let diff = diff_trees(old, new);
        let is_creation = old.is_empty() && !new.is_empty();

        let change_type = if is_creation {
            ChangeType::Creation
        } else {
            classify_label(label).unwrap_or_else(|| {
                let all_stylesheets = diff
                    .changed_paths()
                    .iter()
                    .all(|p| is_stylesheet(p));
                if !diff.added.is_empty() {
                    ChangeType::Feature
                } else if !diff.is_empty() && all_stylesheets {
                    ChangeType::Style
                } else {
                    ChangeType::Feature
                }
            })
        };

        let structural_added = diff.added.iter().any(|p| is_structural(p));
        let severity = if is_creation
            || diff.len() > self.config.major_file_threshold
            || structural_added
        {
            Severity::Major
        } else {
            Severity::Minor
        };

        ChangeAnalysis {
            added: diff.added,
            removed: diff.removed,
            modified: diff.modified,
            change_type,
            severity,
        }
    }

    /// Whether a change deserves a version: always for manual saves,
    /// otherwise only for major changes.
    pub fn should_snapshot(&self, analysis: &ChangeAnalysis, label: &SnapshotLabel) -> bool {
        if label.is_manual() {
            return true;
        }
        !analysis.is_empty() && analysis.severity == Severity::Major
    }

    /// Builds a version holding a full copy of `new`.
    ///
    /// `sequence` is the 1-based position the version will take in its
    /// history and feeds auto-generated names.
    pub fn create_snapshot(
        &self,
        old: &FileTree,
        new: &FileTree,
        label: &SnapshotLabel,
        sequence: usize,
    ) -> Version {
        let analysis = self.analyze_changes(old, new, label.text());
        let name = match label {
            SnapshotLabel::Manual(name) => name.clone(),
            SnapshotLabel::Auto(description) => auto_name(sequence, &analysis, description),
        };

        Version {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            timestamp: current_time(self.time_provider.as_ref()),
            files: new.clone(),
            metadata: VersionMetadata {
                change_type: analysis.change_type,
                severity: analysis.severity,
                changed_files: analysis.changed_files(),
                auto_generated: !label.is_manual(),
                sequence,
            },
        }
    }

    /// Builds the first version of a project.
    pub fn initial_snapshot(&self, tree: &FileTree) -> Version {
        Version {
            id: uuid::Uuid::new_v4().to_string(),
            name: INITIAL_VERSION_NAME.to_string(),
            timestamp: current_time(self.time_provider.as_ref()),
            files: tree.clone(),
            metadata: VersionMetadata {
                change_type: ChangeType::Creation,
                severity: Severity::Major,
                changed_files: tree.keys().cloned().collect(),
                auto_generated: true,
                sequence: 1,
            },
        }
    }
}

/// First matching keyword category, checked as fix, style, refactor, feature.
fn classify_label(label: &str) -> Option<ChangeType> {
    let lower = label.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if hit(FIX_WORDS) {
        Some(ChangeType::Fix)
    } else if hit(STYLE_WORDS) {
        Some(ChangeType::Style)
    } else if hit(REFACTOR_WORDS) {
        Some(ChangeType::Refactor)
    } else if hit(FEATURE_WORDS) {
        Some(ChangeType::Feature)
    } else {
        None
    }
}

fn is_stylesheet(path: &str) -> bool {
    let lower = path.to_lowercase();
    STYLESHEET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Root-level HTML pages and package manifests.
fn is_structural(path: &str) -> bool {
    if path.contains('/') {
        return false;
    }
    path.to_lowercase().ends_with(".html") || STRUCTURAL_FILES.contains(&path)
}

fn auto_name(sequence: usize, analysis: &ChangeAnalysis, description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        return format!(
            "v{} {} ({} files)",
            sequence,
            analysis.change_type,
            analysis.total_changes()
        );
    }
    let excerpt: String = description.chars().take(NAME_LABEL_CHARS).collect();
    let ellipsis = if description.chars().count() > NAME_LABEL_CHARS {
        "..."
    } else {
        ""
    };
    format!("v{} {}: {}{}", sequence, analysis.change_type, excerpt, ellipsis)
}

/// Newest-first list of a project's versions.
///
/// Sequence numbers keep counting when the cap drops old versions. The
/// counter is recovered from the stored versions' `metadata.sequence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionHistory {
    versions: Vec<Version>,
    #[serde(default)]
    max_versions: Option<usize>,
    #[serde(default)]
    last_sequence: usize,
}

impl VersionHistory {
    /// Creates an empty history. `max_versions` caps retention when set.
    pub fn new(max_versions: Option<usize>) -> Self {
        Self {
            versions: Vec::new(),
            max_versions,
            last_sequence: 0,
        }
    }

    /// Wraps previously stored versions (newest first).
    pub fn from_versions(versions: Vec<Version>, max_versions: Option<usize>) -> Self {
        // versions stored before sequences were recorded count by position
        let last_sequence = versions
            .iter()
            .map(|v| v.metadata.sequence)
            .max()
            .unwrap_or(0)
            .max(versions.len());
        let mut history = Self {
            versions,
            max_versions,
            last_sequence,
        };
        history.enforce_cap();
        history
    }

    /// Adds a version at the front, dropping the oldest beyond the cap.
    pub fn record(&mut self, version: Version) {
        self.last_sequence = match version.metadata.sequence {
            0 => self.last_sequence + 1,
            sequence => self.last_sequence.max(sequence),
        };
        self.versions.insert(0, version);
        self.enforce_cap();
    }

    /// Looks up a version by id.
    pub fn find(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Most recent version.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.first()
    }

    /// Versions, newest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Number of retained versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Sequence number the next recorded version takes.
    pub fn next_sequence(&self) -> usize {
        self.last_sequence + 1
    }

    /// Consumes the history, returning versions newest first.
    pub fn into_versions(self) -> Vec<Version> {
        self.versions
    }

    fn enforce_cap(&mut self) {
        if let Some(max) = self.max_versions {
            self.versions.truncate(max.max(1));
        }
    }
}
