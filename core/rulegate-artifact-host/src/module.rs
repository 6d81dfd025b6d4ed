//! Loader seam between the registry and a concrete module runtime.

use crate::artifact::ArtifactFactory;
use crate::error::ArtifactHostError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened module: resolves artifact names to factories.
pub trait ModuleHandle: Send {
    /// Fully-qualified names of every artifact the module defines.
    fn artifact_names(&self) -> Vec<String>;

    fn resolve(&self, name: &str) -> Option<Arc<dyn ArtifactFactory>>;

    /// Releases the module. A handle that fails to close stays live.
    fn close(&mut self) -> Result<(), ArtifactHostError> {
        Ok(())
    }
}

/// Opens module files of the formats it accepts.
pub trait ModuleLoader: Send + Sync {
    /// Whether `path` has an extension this loader understands.
    fn accepts(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> Result<Box<dyn ModuleHandle>, ArtifactHostError>;
}

/// Snapshot of one loaded module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub source: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub artifacts: Vec<String>,
}
