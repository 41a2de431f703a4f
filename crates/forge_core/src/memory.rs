//! Per-project conversation memory.
//!
//! A [`ConversationStore`] keeps one [`ConversationContext`] per project:
//! recent messages, the latest file tree, goals, preferences and a rolling
//! summary. Retention is bounded per context (messages) and across contexts
//! (idle eviction plus a count cap). Every mutation is mirrored to an optional
//! [`ContextPersistence`] backend; persistence failures are logged and counted
//! but never undo or block the in-memory change.

use crate::config::MemoryConfig;
use crate::error::PersistError;
use crate::types::{FileTree, Message, Role};
use crate::{current_time, SharedTimeProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Topic buckets used for the rolling summary, in reporting order.
const SUMMARY_TOPICS: &[(&str, &[&str])] = &[
    ("feature building", &["build", "create", "make", "add"]),
    ("design and styling", &["color", "design", "style", "css", "layout"]),
    ("bug fixing", &["bug", "error", "problem", "broken"]),
    ("optimization", &["improve", "optimize", "faster", "performance"]),
];

/// Everything remembered about one project's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Owning project.
    pub project_id: String,
    /// Latest known tree.
    pub file_tree: FileTree,
    /// Retained messages, oldest first.
    pub messages: Vec<Message>,
    /// Project goals, deduplicated, in insertion order.
    pub goals: Vec<String>,
    /// Free-form user preferences.
    pub preferences: BTreeMap<String, String>,
    /// Rolling summary of earlier conversation.
    pub summary: String,
    /// Last time the context was read or written.
    pub last_activity: DateTime<Utc>,
    /// Messages appended since initialization, including dropped ones.
    #[serde(default)]
    pub appended_count: u64,
}

/// Storage backend for conversation contexts.
pub trait ContextPersistence: Send {
    /// Replaces the stored set of contexts.
    fn save_contexts(
        &self,
        contexts: &BTreeMap<String, ConversationContext>,
    ) -> Result<(), PersistError>;

    /// Reads the stored set of contexts. An empty store yields an empty map.
    fn load_contexts(&self) -> Result<BTreeMap<String, ConversationContext>, PersistError>;
}

impl<T: ContextPersistence + Sync> ContextPersistence for Arc<T> {
    fn save_contexts(
        &self,
        contexts: &BTreeMap<String, ConversationContext>,
    ) -> Result<(), PersistError> {
        (**self).save_contexts(contexts)
    }

    fn load_contexts(&self) -> Result<BTreeMap<String, ConversationContext>, PersistError> {
        (**self).load_contexts()
    }
}

/// Contexts removed by [`ConversationStore::cleanup_old_contexts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Dropped for being idle past the retention window.
    pub expired: Vec<String>,
    /// Dropped to respect the context count cap.
    pub overflow: Vec<String>,
    /// Contexts left afterwards.
    pub remaining: usize,
}

impl EvictionReport {
    /// Total number of evicted contexts.
    pub fn evicted(&self) -> usize {
        self.expired.len() + self.overflow.len()
    }
}

/// Aggregate numbers about the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Live contexts.
    pub total_contexts: usize,
    /// Messages across all contexts.
    pub total_messages: usize,
    /// Least recent activity.
    pub oldest_activity: Option<DateTime<Utc>>,
    /// Most recent activity.
    pub newest_activity: Option<DateTime<Utc>>,
    /// Persistence calls that failed since construction.
    pub persist_failures: u64,
}

/// Bounded in-memory store of conversation contexts.
pub struct ConversationStore {
    config: MemoryConfig,
    contexts: BTreeMap<String, ConversationContext>,
    persistence: Option<Box<dyn ContextPersistence>>,
    time_provider: Option<SharedTimeProvider>,
    persist_failures: u64,
}

impl ConversationStore {
    /// Creates an empty store without persistence.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            contexts: BTreeMap::new(),
            persistence: None,
            time_provider: None,
            persist_failures: 0,
        }
    }

    /// Mirrors every change to `persistence`.
    pub fn with_persistence(mut self, persistence: Box<dyn ContextPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Uses `provider` instead of system time.
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

    /// Returns the active limits.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Replaces in-memory contexts with the persisted ones.
    ///
    /// Returns the number of contexts loaded. A failing backend leaves the
    /// store untouched and is counted in [`MemoryStats::persist_failures`].
    pub fn load(&mut self) -> usize {
        let Some(persistence) = &self.persistence else {
            return 0;
        };
        match persistence.load_contexts() {
            Ok(contexts) => {
                self.contexts = contexts;
                tracing::debug!(count = self.contexts.len(), "loaded conversation contexts");
                self.contexts.len()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load conversation contexts");
                self.persist_failures += 1;
                0
            }
        }
    }

    /// Creates (or replaces) the context for a project.
    pub fn initialize(
        &mut self,
        project_id: &str,
        file_tree: FileTree,
        initial_messages: Vec<Message>,
    ) -> &ConversationContext {
        let mut messages = initial_messages;
        trim_oldest(&mut messages, self.config.max_messages);

        let context = ConversationContext {
            project_id: project_id.to_string(),
            file_tree,
            messages,
            goals: Vec::new(),
            preferences: BTreeMap::new(),
            summary: String::new(),
            last_activity: self.now(),
            appended_count: 0,
        };
        self.contexts.insert(project_id.to_string(), context);
        self.persist();
        &self.contexts[project_id]
    }

    /// Returns a project's context and marks it active.
    pub fn get(&mut self, project_id: &str) -> Option<&ConversationContext> {
        let now = self.now();
        let context = self.contexts.get_mut(project_id)?;
        context.last_activity = now;
        Some(&*context)
    }

    /// Returns a project's context without touching its activity time.
    pub fn peek(&self, project_id: &str) -> Option<&ConversationContext> {
        self.contexts.get(project_id)
    }

    /// Whether a context exists for the project.
    pub fn contains(&self, project_id: &str) -> bool {
        self.contexts.contains_key(project_id)
    }

    /// Appends a message, dropping the oldest beyond the cap.
    ///
    /// Returns false when the project has no context.
    pub fn add_message(&mut self, project_id: &str, message: Message) -> bool {
        let now = self.now();
        let max_messages = self.config.max_messages;
        let interval = self.config.summary_interval as u64;
        let window = self.config.summary_window;

        let Some(context) = self.contexts.get_mut(project_id) else {
            tracing::debug!(project_id, "add_message on unknown context ignored");
            return false;
        };
        context.messages.push(message);
        context.last_activity = now;
        context.appended_count += 1;
        trim_oldest(&mut context.messages, max_messages);

        if interval > 0 && context.appended_count % interval == 0 {
            context.summary = summarize(&context.messages, window);
            tracing::debug!(project_id, summary = %context.summary, "rebuilt conversation summary");
        }

        self.persist();
        true
    }

    /// Stores the latest tree for a project.
    pub fn update_file_tree(&mut self, project_id: &str, file_tree: FileTree) -> bool {
        let now = self.now();
        let Some(context) = self.contexts.get_mut(project_id) else {
            return false;
        };
        context.file_tree = file_tree;
        context.last_activity = now;
        self.persist();
        true
    }

    /// Adds a goal unless it is already recorded.
    pub fn add_goal(&mut self, project_id: &str, goal: &str) -> bool {
        let now = self.now();
        let Some(context) = self.contexts.get_mut(project_id) else {
            return false;
        };
        if context.goals.iter().any(|g| g == goal) {
            return true;
        }
        context.goals.push(goal.to_string());
        context.last_activity = now;
        self.persist();
        true
    }

    /// Merges `preferences` into the project's preference bag.
    pub fn update_preferences(
        &mut self,
        project_id: &str,
        preferences: BTreeMap<String, String>,
    ) -> bool {
        let now = self.now();
        let Some(context) = self.contexts.get_mut(project_id) else {
            return false;
        };
        context.preferences.extend(preferences);
        context.last_activity = now;
        self.persist();
        true
    }

    /// Renders the project's memory as prompt text. Unknown projects render
    /// as an empty string.
    pub fn context_for_generation(&self, project_id: &str) -> String {
        let Some(context) = self.contexts.get(project_id) else {
            return String::new();
        };

        let skip = context
            .messages
            .len()
            .saturating_sub(self.config.prompt_window);
        let recent = context.messages[skip..]
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let mut header = String::new();
        if !context.summary.is_empty() {
            header.push_str(&format!("\nPrevious conversation summary: {}", context.summary));
        }
        if !context.goals.is_empty() {
            header.push_str(&format!("\nProject goals: {}", context.goals.join(", ")));
        }
        if !context.preferences.is_empty() {
            let prefs = context
                .preferences
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            header.push_str(&format!("\nUser preferences: {}", prefs));
        }

        format!(
            "**CONVERSATION CONTEXT:**{}\n\n**RECENT MESSAGES:**\n{}",
            header, recent
        )
    }

    /// Drops idle contexts, then keeps only the most recently active ones.
    pub fn cleanup_old_contexts(&mut self) -> EvictionReport {
        let now = self.now().timestamp();
        let window = self.config.idle_window().as_secs() as i64;

        let expired: Vec<String> = self
            .contexts
            .iter()
            .filter(|(_, ctx)| now - ctx.last_activity.timestamp() > window)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.contexts.remove(id);
        }

        let mut overflow = Vec::new();
        if self.contexts.len() > self.config.max_contexts {
            let mut by_activity: Vec<(String, DateTime<Utc>)> = self
                .contexts
                .iter()
                .map(|(id, ctx)| (id.clone(), ctx.last_activity))
                .collect();
            by_activity.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            overflow = by_activity
                .into_iter()
                .skip(self.config.max_contexts)
                .map(|(id, _)| id)
                .collect();
            for id in &overflow {
                self.contexts.remove(id);
            }
        }

        let report = EvictionReport {
            expired,
            overflow,
            remaining: self.contexts.len(),
        };
        if report.evicted() > 0 {
            tracing::info!(
                expired = report.expired.len(),
                overflow = report.overflow.len(),
                "evicted conversation contexts"
            );
        }
        self.persist();
        report
    }

    /// Forgets a project's context. Returns whether one existed.
    pub fn reset(&mut self, project_id: &str) -> bool {
        let existed = self.contexts.remove(project_id).is_some();
        if existed {
            self.persist();
        }
        existed
    }

    /// Aggregate numbers about the store.
    pub fn stats(&self) -> MemoryStats {
        let activity = self.contexts.values().map(|c| c.last_activity);
        MemoryStats {
            total_contexts: self.contexts.len(),
            total_messages: self.contexts.values().map(|c| c.messages.len()).sum(),
            oldest_activity: activity.clone().min(),
            newest_activity: activity.max(),
            persist_failures: self.persist_failures,
        }
    }

    /// Current time on the store's clock.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        current_time(self.time_provider.as_ref())
    }

    fn persist(&mut self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if let Err(e) = persistence.save_contexts(&self.contexts) {
            tracing::warn!(error = %e, "failed to persist conversation contexts");
            self.persist_failures += 1;
        }
    }
}

fn trim_oldest(messages: &mut Vec<Message>, max: usize) {
    if messages.len() > max {
        let overflow = messages.len() - max;
        messages.drain(..overflow);
    }
}

/// Topic summary of the user messages among the last `window` messages.
fn summarize(messages: &[Message], window: usize) -> String {
    let skip = messages.len().saturating_sub(window);
    let user_texts: Vec<String> = messages[skip..]
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.to_lowercase())
        .collect();

    let topics: Vec<&str> = SUMMARY_TOPICS
        .iter()
        .filter(|(_, words)| {
            user_texts
                .iter()
                .any(|text| words.iter().any(|w| text.contains(w)))
        })
        .map(|(topic, _)| *topic)
        .collect();

    if topics.is_empty() {
        String::new()
    } else {
        format!("Conversation focused on: {}", topics.join(", "))
    }
}
