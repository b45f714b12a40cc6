//! State Store (C7): durable checkpoints of `ExecutionContext`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::error::{Result, WorkflowForgeError};
use crate::log_warn;
use crate::types::{ExecutionContext, ProjectStatus};

/// Durable store for `ExecutionContext` checkpoints. Implementations must
/// make `save` atomic with respect to process crash — a reader must never
/// observe a partially-written context.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, context: &ExecutionContext) -> Result<()>;
    async fn load(&self, project_id: &str) -> Result<Option<ExecutionContext>>;
    async fn delete(&self, project_id: &str) -> Result<()>;
    async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<ExecutionContext>>;
}

/// Non-durable store backing tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryStateStore {
    contexts: Mutex<HashMap<String, ExecutionContext>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, context: &ExecutionContext) -> Result<()> {
        self.contexts.lock().await.insert(context.project_id.clone(), context.clone());
        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<Option<ExecutionContext>> {
        Ok(self.contexts.lock().await.get(project_id).cloned())
    }

    async fn delete(&self, project_id: &str) -> Result<()> {
        self.contexts.lock().await.remove(project_id);
        Ok(())
    }

    async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<ExecutionContext>> {
        Ok(self
            .contexts
            .lock()
            .await
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }
}

/// One JSON file per project under `root`, named `<project_id>.json`.
/// Writes use the write-temp-sync-rename pattern so a crash mid-write
/// leaves either the old or the new file, never a partial one.
pub struct FileStateStore {
    root: PathBuf,
    /// Per-project guard so concurrent saves for the same project serialize;
    /// distinct projects never block each other.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, project_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", project_id))
    }

    async fn lock_for(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(project_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }
}

#[async_trait::async_trait]
impl StateStore for FileStateStore {
    async fn save(&self, context: &ExecutionContext) -> Result<()> {
        let guard = self.lock_for(&context.project_id).await;
        let _held = guard.lock().await;

        fs::create_dir_all(&self.root)
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to create state dir: {}", e)))?;

        let json = serde_json::to_string_pretty(context)
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to serialize context: {}", e)))?;

        let temp_file = NamedTempFile::new_in(&self.root)
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to create temp file: {}", e)))?;

        fs::write(temp_file.path(), &json)
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to write temp file: {}", e)))?;

        let file = fs::File::open(temp_file.path())
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to open temp file for sync: {}", e)))?;
        file.sync_all().map_err(|e| WorkflowForgeError::Internal(format!("failed to sync temp file: {}", e)))?;

        temp_file
            .persist(self.path_for(&context.project_id))
            .map_err(|e| WorkflowForgeError::Internal(format!("failed to persist state file: {}", e)))?;

        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<Option<ExecutionContext>> {
        let path = self.path_for(project_id);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let context = serde_json::from_str(&contents)
                    .map_err(|e| WorkflowForgeError::Internal(format!("corrupt state file {}: {}", path.display(), e)))?;
                Ok(Some(context))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkflowForgeError::Internal(format!("failed to read {}: {}", path.display(), e))),
        }
    }

    async fn delete(&self, project_id: &str) -> Result<()> {
        let path = self.path_for(project_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorkflowForgeError::Internal(format!("failed to delete {}: {}", path.display(), e))),
        }
    }

    async fn list_by_status(&self, status: ProjectStatus) -> Result<Vec<ExecutionContext>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkflowForgeError::Internal(format!("failed to scan {}: {}", self.root.display(), e))),
        };

        let mut matches = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).ok().and_then(|c| serde_json::from_str::<ExecutionContext>(&c).ok()) {
                Some(context) if context.status == status => matches.push(context),
                Some(_) => {}
                None => log_warn!("skipping unreadable state file {}", path.display()),
            }
        }
        Ok(matches)
    }
}
