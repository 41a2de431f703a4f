//! Core data types shared across the generation pipeline.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A generated project's files: relative forward-slash path to full content.
///
/// Directories are implied by path prefixes. A path that is absent does not exist.
pub type FileTree = BTreeMap<String, String>;

/// A set of edits against a [`FileTree`]. `None` deletes the path.
pub type FileChanges = BTreeMap<String, Option<String>>;

/// String value a model may send in place of `null` to delete a file.
pub const DELETE_SENTINEL: &str = "DELETE";

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person driving the builder.
    User,
    /// The generation backend.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// An inline image sent along with a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 payload without a data-URL prefix.
    pub data: String,
}

impl ImageAttachment {
    /// Builds an attachment from a `data:<mime>;base64,<payload>` URL.
    ///
    /// Returns `None` when the URL is not a base64 data URL.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;
        if mime_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    /// Encodes raw image bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    /// MIME type implied by a file extension, if it is a known image type.
    pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }
}

/// One conversation entry. Immutable once appended to a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque unique id.
    pub id: String,
    /// Who wrote it.
    pub role: Role,
    /// Text body.
    pub content: String,
    /// When it was written.
    pub timestamp: DateTime<Utc>,
    /// Inline images (user turns only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
    /// Plan steps proposed in this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    /// Paths touched by this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl Message {
    /// Creates a message with a fresh id stamped with the system clock.
    ///
    /// Code running under an injected clock restamps with [`Message::at`].
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            images: Vec::new(),
            plan: None,
            files: None,
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Overrides the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attaches images.
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// Attaches plan steps.
    pub fn with_plan(mut self, plan: Vec<String>) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Attaches touched file paths.
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }
}

/// How a user turn is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowMode {
    /// Propose a plan and wait for approval.
    Plan,
    /// Generate file edits directly.
    Action,
    /// Answer without touching files.
    Discussion,
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowMode::Plan => write!(f, "PLAN"),
            WorkflowMode::Action => write!(f, "ACTION"),
            WorkflowMode::Discussion => write!(f, "DISCUSSION"),
        }
    }
}

/// Kind of change a version captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// First content of a project.
    Creation,
    /// New functionality.
    Feature,
    /// Bug fix.
    Fix,
    /// Visual change.
    Style,
    /// Restructuring without behavior change.
    Refactor,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Creation => "creation",
            ChangeType::Feature => "feature",
            ChangeType::Fix => "fix",
            ChangeType::Style => "style",
            ChangeType::Refactor => "refactor",
        };
        f.write_str(s)
    }
}

/// How significant a change is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Small, local edit.
    Minor,
    /// Large or structural edit.
    Major,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Major => write!(f, "major"),
        }
    }
}

/// Classification attached to every version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Kind of change.
    pub change_type: ChangeType,
    /// Significance.
    pub severity: Severity,
    /// Paths added, removed or modified relative to the previous tree.
    pub changed_files: Vec<String>,
    /// False for versions saved explicitly by the user.
    pub auto_generated: bool,
    /// 1-based position in the project's history. Never reused, even after
    /// older versions are dropped.
    #[serde(default)]
    pub sequence: usize,
}

/// Immutable, labeled full copy of a file tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Full tree at this point.
    pub files: FileTree,
    /// Change classification.
    pub metadata: VersionMetadata,
}

/// A project known to the local workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current files.
    #[serde(default)]
    pub files: FileTree,
    /// Whether the project is shared publicly.
    #[serde(default)]
    pub is_public: bool,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Creates an empty private project.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            files: FileTree::new(),
            is_public: false,
            updated_at: now,
        }
    }
}
