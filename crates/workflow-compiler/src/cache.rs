//! Filesystem cache for compiled workflows.
//!
//! Layout under the cache directory:
//!
//! ```text
//! index.json        task fingerprint -> workflow id
//! <wf_id>.json      CompiledWorkflow
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::{Result, WorkflowError};
use crate::model::{task_fingerprint, CompiledWorkflow};

pub struct WorkflowCache {
    dir: PathBuf,
    index: RwLock<HashMap<String, String>>,
}

impl WorkflowCache {
    /// Open (or create) a cache directory and load its index.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let index = match fs::read(dir.join("index.json")) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(%err, "workflow index unreadable; starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    pub fn save(&self, workflow: &CompiledWorkflow) -> Result<()> {
        let path = self.workflow_path(&workflow.workflow_id);
        fs::write(&path, serde_json::to_vec_pretty(workflow)?)?;
        {
            let mut index = self.index.write();
            index.insert(
                workflow.task_fingerprint.clone(),
                workflow.workflow_id.clone(),
            );
            self.persist_index(&index)?;
        }
        debug!(id = %workflow.workflow_id, "workflow saved");
        Ok(())
    }

    pub fn get(&self, workflow_id: &str) -> Result<CompiledWorkflow> {
        let bytes = fs::read(self.workflow_path(workflow_id))
            .map_err(|_| WorkflowError::NotFound(workflow_id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Look a workflow up by task description (fingerprint match).
    pub fn lookup_by_task(&self, task: &str) -> Option<CompiledWorkflow> {
        let id = self.index.read().get(&task_fingerprint(task)).cloned()?;
        self.get(&id).ok()
    }

    pub fn remove(&self, workflow_id: &str) -> Result<()> {
        let path = self.workflow_path(workflow_id);
        if !path.exists() {
            return Err(WorkflowError::NotFound(workflow_id.to_string()));
        }
        fs::remove_file(path)?;
        let mut index = self.index.write();
        index.retain(|_, id| id != workflow_id);
        self.persist_index(&index)
    }

    /// Copy a stored workflow to an external path.
    pub fn export(&self, workflow_id: &str, destination: impl AsRef<Path>) -> Result<()> {
        let workflow = self.get(workflow_id)?;
        fs::write(destination, serde_json::to_vec_pretty(&workflow)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn workflow_path(&self, workflow_id: &str) -> PathBuf {
        self.dir.join(format!("{workflow_id}.json"))
    }

    fn persist_index(&self, index: &HashMap<String, String>) -> Result<()> {
        fs::write(self.dir.join("index.json"), serde_json::to_vec_pretty(index)?)?;
        Ok(())
    }
}
