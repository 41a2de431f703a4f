//! Local key/value store for workspace state.
//!
//! A single redb table maps namespaced string keys to JSON documents:
//!
//! | key                         | value                                   |
//! |-----------------------------|-----------------------------------------|
//! | `appforge-projects`         | list of [`ProjectRecord`]               |
//! | `appforge-conversations`    | map of project id → conversation context |
//! | `appforge-versions/<id>`    | a project's versions, newest first      |
//! | `appforge-workflow/<id>`    | a project's [`WorkflowState`]           |

use crate::error::PersistError;
use crate::memory::{ContextPersistence, ConversationContext};
use crate::types::{ProjectRecord, Version};
use crate::workflow::WorkflowState;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STATE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("state");

/// Key holding the project list.
pub const PROJECTS_KEY: &str = "appforge-projects";

/// Key holding all conversation contexts.
pub const CONVERSATIONS_KEY: &str = "appforge-conversations";

const VERSIONS_PREFIX: &str = "appforge-versions/";
const WORKFLOW_PREFIX: &str = "appforge-workflow/";

/// redb-backed JSON document store.
pub struct LocalStore {
    db: Database,
    path: PathBuf,
}

impl LocalStore {
    /// Opens the store at `path`, creating the file and table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistError::Database(format!("failed to create store dir: {}", e)))?;
        }

        let db = Database::create(&path)
            .map_err(|e| PersistError::Database(format!("failed to open store: {}", e)))?;

        // make sure the table exists so read transactions can open it
        let write_txn = db
            .begin_write()
            .map_err(|e| PersistError::Database(format!("failed to begin write: {}", e)))?;
        write_txn
            .open_table(STATE_TABLE)
            .map_err(|e| PersistError::Database(format!("failed to open state table: {}", e)))?;
        write_txn
            .commit()
            .map_err(|e| PersistError::Database(format!("failed to commit: {}", e)))?;

        Ok(Self { db, path })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw JSON stored under `key`.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, PersistError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| PersistError::Database(format!("failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(STATE_TABLE)
            .map_err(|e| PersistError::Database(format!("failed to open state table: {}", e)))?;
        let value = table
            .get(key)
            .map_err(|e| PersistError::Database(format!("failed to read {}: {}", key, e)))?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    /// Replaces the raw JSON stored under `key`.
    pub fn put_raw(&self, key: &str, json: &str) -> Result<(), PersistError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| PersistError::Database(format!("failed to begin write: {}", e)))?;
        {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(|e| PersistError::Database(format!("failed to open state table: {}", e)))?;
            table
                .insert(key, json)
                .map_err(|e| PersistError::Database(format!("failed to write {}: {}", key, e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| PersistError::Database(format!("failed to commit: {}", e)))
    }

    /// Deletes `key`. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, PersistError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| PersistError::Database(format!("failed to begin write: {}", e)))?;
        let existed = {
            let mut table = write_txn
                .open_table(STATE_TABLE)
                .map_err(|e| PersistError::Database(format!("failed to open state table: {}", e)))?;
            let removed = table
                .remove(key)
                .map_err(|e| PersistError::Database(format!("failed to remove {}: {}", key, e)))?;
            removed.is_some()
        };
        write_txn
            .commit()
            .map_err(|e| PersistError::Database(format!("failed to commit: {}", e)))?;
        Ok(existed)
    }

    /// Lists stored keys in order.
    pub fn keys(&self) -> Result<Vec<String>, PersistError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| PersistError::Database(format!("failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(STATE_TABLE)
            .map_err(|e| PersistError::Database(format!("failed to open state table: {}", e)))?;

        let mut keys = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| PersistError::Database(format!("failed to iterate: {}", e)))?
        {
            let (key, _) =
                entry.map_err(|e| PersistError::Database(format!("failed to read entry: {}", e)))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    /// Reads and decodes the document under `key`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistError> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Encodes and stores `value` under `key`.
    pub fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistError> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json)
    }

    /// All known projects.
    pub fn load_projects(&self) -> Result<Vec<ProjectRecord>, PersistError> {
        Ok(self.get_json(PROJECTS_KEY)?.unwrap_or_default())
    }

    /// Replaces the project list.
    pub fn save_projects(&self, projects: &[ProjectRecord]) -> Result<(), PersistError> {
        self.put_json(PROJECTS_KEY, projects)
    }

    /// A project's versions, newest first.
    pub fn load_versions(&self, project_id: &str) -> Result<Vec<Version>, PersistError> {
        Ok(self.get_json(&versions_key(project_id))?.unwrap_or_default())
    }

    /// Replaces a project's versions.
    pub fn save_versions(&self, project_id: &str, versions: &[Version]) -> Result<(), PersistError> {
        self.put_json(&versions_key(project_id), versions)
    }

    /// A project's saved workflow state, if any.
    pub fn load_workflow(&self, project_id: &str) -> Result<Option<WorkflowState>, PersistError> {
        self.get_json(&workflow_key(project_id))
    }

    /// Stores a project's workflow state.
    pub fn save_workflow(&self, project_id: &str, state: &WorkflowState) -> Result<(), PersistError> {
        self.put_json(&workflow_key(project_id), state)
    }

    /// Removes a project's versions and workflow state.
    pub fn remove_project_state(&self, project_id: &str) -> Result<(), PersistError> {
        self.remove(&versions_key(project_id))?;
        self.remove(&workflow_key(project_id))?;
        Ok(())
    }
}

impl ContextPersistence for LocalStore {
    fn save_contexts(
        &self,
        contexts: &BTreeMap<String, ConversationContext>,
    ) -> Result<(), PersistError> {
        self.put_json(CONVERSATIONS_KEY, contexts)
    }

    fn load_contexts(&self) -> Result<BTreeMap<String, ConversationContext>, PersistError> {
        Ok(self.get_json(CONVERSATIONS_KEY)?.unwrap_or_default())
    }
}

fn versions_key(project_id: &str) -> String {
    format!("{}{}", VERSIONS_PREFIX, project_id)
}

fn workflow_key(project_id: &str) -> String {
    format!("{}{}", WORKFLOW_PREFIX, project_id)
}
