//! Cluster state persistence

use kyma_core::ExternalError;
use kyma_core::domain::cluster::ClusterState;
use std::path::{Path, PathBuf};
use tracing::info;

/// Durable record of provisioned clusters
pub trait ClusterStateStore {
    fn save(&self, state: &ClusterState) -> Result<(), ExternalError>;
}

/// Stores one pretty-printed JSON file per cluster under `<root>/clusters`
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the state file for a cluster
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join("clusters").join(format!("{}.json", name))
    }

    /// Loads the state saved for a cluster
    pub fn load(&self, name: &str) -> Result<ClusterState, ExternalError> {
        let path = self.path_for(name);
        let content = std::fs::read_to_string(&path).map_err(|e| ExternalError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            ExternalError::Parse(format!("invalid cluster state {}: {}", path.display(), e))
        })
    }
}

impl ClusterStateStore for FileStateStore {
    fn save(&self, state: &ClusterState) -> Result<(), ExternalError> {
        let path = self.path_for(&state.cluster.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExternalError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ExternalError::Parse(format!("failed to serialize cluster state: {}", e)))?;
        std::fs::write(&path, json).map_err(|e| ExternalError::io(&path, e))?;

        info!("Saved state of cluster {} to {}", state.cluster.name, path.display());
        Ok(())
    }
}
