//! Hot-swappable registry of loaded artifact modules.
//!
//! Modules are keyed by absolute source path and kept in load order.
//! Loading, reloading, eviction and name resolution all run under the
//! registry's single lock, so a resolver never observes a module that is
//! being replaced.

use crate::artifact::ArtifactType;
use crate::error::ArtifactHostError;
use crate::module::{ModuleHandle, ModuleInfo, ModuleLoader};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

struct Module {
    source: PathBuf,
    loaded_at: DateTime<Utc>,
    handle: Box<dyn ModuleHandle>,
}

impl Module {
    fn new(source: &Path, handle: Box<dyn ModuleHandle>) -> Self {
        Self {
            source: source.to_path_buf(),
            loaded_at: Utc::now(),
            handle,
        }
    }
}

pub struct ArtifactRegistry {
    loader: Arc<dyn ModuleLoader>,
    default_location: PathBuf,
    modules: Mutex<Vec<Module>>,
}

impl ArtifactRegistry {
    /// Creates an empty registry. Nothing is loaded until a load call.
    pub fn new(loader: Arc<dyn ModuleLoader>, default_location: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            default_location: default_location.into(),
            modules: Mutex::new(Vec::new()),
        }
    }

    pub fn default_location(&self) -> &Path {
        &self.default_location
    }

    // ================================================================
    // Loading / Unloading
    // ================================================================

    /// Loads every module found under `path`, recursively.
    ///
    /// Modules already loaded from the same file are skipped unless
    /// `force_reload` is set, in which case the file is reopened and the
    /// old module replaced only once the new one opened cleanly. Returns the
    /// number of modules loaded or reloaded.
    pub fn load_from(
        &self,
        path: impl AsRef<Path>,
        force_reload: bool,
    ) -> Result<usize, ArtifactHostError> {
        let location = absolute(path.as_ref());
        if is_missing_or_empty(&location) {
            return Err(ArtifactHostError::MissingLocation { path: location });
        }

        let mut modules = self.lock();
        let loaded = self.load_recursive(&mut modules, &location, force_reload);
        if loaded > 0 || force_reload {
            info!(path = %location.display(), loaded, "Loaded artifact modules");
        }
        Ok(loaded)
    }

    /// [`ArtifactRegistry::load_from`] the configured default location.
    pub fn load_from_default_location(&self, force_reload: bool) -> Result<usize, ArtifactHostError> {
        self.load_from(&self.default_location, force_reload)
    }

    /// Evicts and closes the module loaded from `path`.
    /// Returns `false` if no module was loaded from there.
    pub fn unload(&self, path: impl AsRef<Path>) -> Result<bool, ArtifactHostError> {
        let source = absolute(path.as_ref());
        let mut modules = self.lock();
        let Some(index) = modules.iter().position(|m| m.source == source) else {
            return Ok(false);
        };
        modules[index].handle.close()?;
        modules.remove(index);
        info!(path = %source.display(), "Unloaded artifact module");
        Ok(true)
    }

    /// Closes and drops every module.
    pub fn shutdown(&self) {
        let mut modules = self.lock();
        for mut module in modules.drain(..) {
            if let Err(e) = module.handle.close() {
                warn!(path = %module.source.display(), "close() failed during shutdown: {}", e);
            }
        }
        info!("Artifact registry shut down");
    }

    // ================================================================
    // Resolution
    // ================================================================

    /// Resolves a fully-qualified artifact name against every module in
    /// load order. The first module that defines the name wins.
    pub fn resolve_type(&self, name: &str) -> Result<ArtifactType, ArtifactHostError> {
        let modules = self.lock();
        modules
            .iter()
            .find_map(|m| {
                m.handle
                    .resolve(name)
                    .map(|factory| ArtifactType::new(name, m.source.clone(), factory))
            })
            .ok_or_else(|| ArtifactHostError::ArtifactNotFound(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Loaded modules in load order.
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.lock()
            .iter()
            .map(|m| ModuleInfo {
                source: m.source.clone(),
                loaded_at: m.loaded_at,
                artifacts: m.handle.artifact_names(),
            })
            .collect()
    }

    // ================================================================
    // Internals
    // ================================================================

    // Every mutation leaves the vector consistent before returning, so a
    // poisoned lock still guards a usable module list.
    fn lock(&self) -> MutexGuard<'_, Vec<Module>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_recursive(&self, modules: &mut Vec<Module>, path: &Path, force_reload: bool) -> usize {
        if path.is_file() {
            return usize::from(self.load_one(modules, path, force_reload));
        }
        if !path.is_dir() {
            debug!(path = %path.display(), "Skipping entry that is neither file nor directory");
            return 0;
        }

        let mut entries: Vec<PathBuf> = match fs::read_dir(path) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(e) => {
                warn!(path = %path.display(), "Failed to list artifact directory: {}", e);
                return 0;
            }
        };
        entries.sort();

        let mut loaded = 0;
        for entry in &entries {
            loaded += self.load_recursive(modules, entry, force_reload);
        }
        loaded
    }

    fn load_one(&self, modules: &mut Vec<Module>, path: &Path, force_reload: bool) -> bool {
        let existing = modules.iter().position(|m| m.source == path);
        if existing.is_some() && !force_reload {
            return false;
        }

        if !self.loader.accepts(path) {
            warn!(
                path = %path.display(),
                "Could not load file located in the artifacts folder since it does not have a compatible extension"
            );
            return false;
        }

        let mut handle = match self.loader.open(path) {
            Ok(handle) => handle,
            Err(e) => {
                error!(path = %path.display(), "Failed to load artifact module: {}", e);
                return false;
            }
        };

        match existing {
            Some(index) => {
                if let Err(e) = modules[index].handle.close() {
                    error!(
                        path = %path.display(),
                        "Failed to close existing module, it might currently be in use and will not be reloaded: {}",
                        e
                    );
                    if let Err(e) = handle.close() {
                        warn!(path = %path.display(), "Failed to discard reopened module: {}", e);
                    }
                    return false;
                }
                info!(path = %path.display(), "Unloaded older artifact module");
                modules[index] = Module::new(path, handle);
            }
            None => modules.push(Module::new(path, handle)),
        }
        info!(path = %path.display(), "Loaded artifact module");
        true
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_missing_or_empty(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    path.is_dir()
        && fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
}
