//! Workspace handle tying config, store and projects together.

use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::generation::GenerationBackend;
use crate::memory::ConversationStore;
use crate::orchestrator::WorkflowOrchestrator;
use crate::storage::LocalStore;
use crate::types::{FileTree, ProjectRecord};
use crate::{current_time, SharedTimeProvider, TimeProvider};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Name of the directory holding workspace state.
pub const FORGE_DIR: &str = ".forge";

const STORE_FILE: &str = "store.redb";

/// Local workspace.
///
/// Owns the `.forge/` directory: `config.toml` plus a redb store with
/// projects, conversations, versions and workflow state.
pub struct Workspace {
    /// Directory containing `.forge/`.
    root: PathBuf,
    config: Config,
    store: Arc<LocalStore>,
    /// Time provider for testing (None = use system time).
    time_provider: Option<SharedTimeProvider>,
}

impl Workspace {
    /// Creates a new workspace under `path`.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceExists` if `.forge/` is already there, or an I/O or
    /// store error if it cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use forge_core::Workspace;
    ///
    /// let workspace = Workspace::init(".").unwrap();
    /// ```
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let forge_dir = root.join(FORGE_DIR);
        if forge_dir.exists() {
            return Err(ForgeError::WorkspaceExists(root));
        }

        fs::create_dir_all(&forge_dir)?;
        let config = Config::default();
        config.save(&forge_dir)?;
        let store = LocalStore::open(forge_dir.join(STORE_FILE))?;
        tracing::info!(root = %root.display(), "initialized workspace");

        Ok(Self {
            root,
            config,
            store: Arc::new(store),
            time_provider: None,
        })
    }

    /// Opens the workspace rooted exactly at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotAWorkspace` when `path` has no `.forge/` directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let forge_dir = root.join(FORGE_DIR);
        if !forge_dir.is_dir() {
            return Err(ForgeError::NotAWorkspace(root));
        }

        let config = Config::load(&forge_dir)?;
        let store = LocalStore::open(forge_dir.join(STORE_FILE))?;
        Ok(Self {
            root,
            config,
            store: Arc::new(store),
            time_provider: None,
        })
    }

    /// Opens the nearest workspace at or above `start`.
    ///
    /// # Errors
    ///
    /// Returns `NotAWorkspace` when no ancestor has a `.forge/` directory.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        match start.ancestors().find(|dir| dir.join(FORGE_DIR).is_dir()) {
            Some(root) => Self::open(root),
            None => Err(ForgeError::NotAWorkspace(start.to_path_buf())),
        }
    }

    /// Uses `provider` instead of system time for projects, memory and
    /// versions.
    pub fn with_time_provider(
        mut self,
        provider: impl Fn() -> i64 + Send + Sync + 'static,
    ) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Directory containing `.forge/`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.forge/` directory.
    pub fn forge_dir(&self) -> PathBuf {
        self.root.join(FORGE_DIR)
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Creates and saves a project.
    pub fn create_project(&self, name: &str, files: FileTree) -> Result<ProjectRecord> {
        let mut projects = self.store.load_projects()?;
        let mut project = ProjectRecord::new(name, current_time(self.time_provider.as_ref()));
        project.files = files;
        projects.push(project.clone());
        self.store.save_projects(&projects)?;
        tracing::info!(id = %project.id, name, "created project");
        Ok(project)
    }

    /// All projects, most recently updated first.
    pub fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        let mut projects = self.store.load_projects()?;
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    /// Finds a project by id, falling back to an exact name match.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` when neither matches.
    pub fn find_project(&self, id_or_name: &str) -> Result<ProjectRecord> {
        let projects = self.store.load_projects()?;
        projects
            .iter()
            .find(|p| p.id == id_or_name)
            .or_else(|| projects.iter().find(|p| p.name == id_or_name))
            .cloned()
            .ok_or_else(|| ForgeError::ProjectNotFound(id_or_name.to_string()))
    }

    /// Stores a modified project, bumping its `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectNotFound` when the id is unknown.
    pub fn update_project(&self, project: &mut ProjectRecord) -> Result<()> {
        let mut projects = self.store.load_projects()?;
        let slot = projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| ForgeError::ProjectNotFound(project.id.clone()))?;
        project.updated_at = current_time(self.time_provider.as_ref());
        *slot = project.clone();
        self.store.save_projects(&projects)?;
        Ok(())
    }

    /// Deletes a project with its versions, workflow state and conversation.
    pub fn delete_project(&self, id_or_name: &str) -> Result<ProjectRecord> {
        let project = self.find_project(id_or_name)?;
        let mut projects = self.store.load_projects()?;
        projects.retain(|p| p.id != project.id);
        self.store.save_projects(&projects)?;
        self.store.remove_project_state(&project.id)?;
        self.memory_store().reset(&project.id);
        tracing::info!(id = %project.id, "deleted project");
        Ok(project)
    }

    /// Conversation memory backed by this workspace's store.
    pub fn memory_store(&self) -> ConversationStore {
        let mut memory = ConversationStore::new(self.config.memory.clone())
            .with_persistence(Box::new(Arc::clone(&self.store)));
        if let Some(provider) = &self.time_provider {
            let provider = Arc::clone(provider);
            memory = memory.with_time_provider(move || provider.now());
        }
        memory.load();
        memory
    }

    /// Builds an orchestrator for `project`, restoring its saved versions,
    /// workflow state and conversation.
    pub fn orchestrator_for(
        &self,
        project: &ProjectRecord,
        backend: Box<dyn GenerationBackend>,
    ) -> Result<WorkflowOrchestrator> {
        let versions = self.store.load_versions(&project.id)?;
        let state = self.store.load_workflow(&project.id)?.unwrap_or_default();

        let mut builder = WorkflowOrchestrator::builder(
            project.id.clone(),
            project.files.clone(),
            self.config.clone(),
            backend,
        )
        .memory(self.memory_store())
        .versions(versions)
        .state(state);
        if let Some(provider) = &self.time_provider {
            let provider = Arc::clone(provider);
            builder = builder.time_provider(move || provider.now());
        }
        Ok(builder.build())
    }

    /// Writes an orchestrator's tree, versions and workflow state back to
    /// the store. Conversation memory persists itself.
    pub fn save_session(&self, orchestrator: &WorkflowOrchestrator) -> Result<ProjectRecord> {
        let mut project = self.find_project(orchestrator.project_id())?;
        project.files = orchestrator.file_tree().clone();
        self.update_project(&mut project)?;
        self.store
            .save_versions(&project.id, orchestrator.versions())?;
        self.store
            .save_workflow(&project.id, orchestrator.state())?;
        tracing::debug!(id = %project.id, "saved session");
        Ok(project)
    }

    /// Writes a project's files under `dest`. Paths that would escape
    /// `dest` are skipped. Returns the number of files written.
    pub fn export_project(&self, id_or_name: &str, dest: impl AsRef<Path>) -> Result<usize> {
        let project = self.find_project(id_or_name)?;
        let dest = dest.as_ref();
        let mut written = 0;

        for (path, content) in &project.files {
            let Some(target) = safe_join(dest, path) else {
                tracing::warn!(path = %path, "skipping unsafe export path");
                continue;
            };
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
            written += 1;
        }
        tracing::info!(id = %project.id, written, dest = %dest.display(), "exported project");
        Ok(written)
    }
}

/// Joins a relative project path onto `base`, rejecting absolute paths and
/// parent components.
fn safe_join(base: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    if path.is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(base.join(relative))
}
