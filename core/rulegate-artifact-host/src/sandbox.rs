//! WebAssembly artifact modules, with one fresh Wasmtime instance per execution.
//!
//! A module is a core Wasm module (binary `.wasm` or text `.wat`) with no
//! imports that exports:
//! - `memory`
//! - `rulegate_alloc(len: i32) -> i32`
//! - `rulegate_manifest() -> i64`
//! - `rulegate_execute(ptr: i32, len: i32) -> i64`
//!
//! `i64` results pack `(ptr << 32) | len` of a UTF-8 JSON document in guest
//! memory. The manifest lists the artifacts the module defines; execute
//! receives the bound facts of one artifact and returns its result.

use crate::artifact::{
    Artifact, ArtifactDescriptor, ArtifactFactory, ArtifactKind, ArtifactManifest,
    FlowFactResult,
};
use crate::error::ArtifactHostError;
use crate::module::{ModuleHandle, ModuleLoader};
use rulegate_types::{FactShape, FactValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use wasmtime::{Engine, Instance, Memory, Module, Store, StoreLimits, StoreLimitsBuilder};

const EXPORT_MEMORY: &str = "memory";
const EXPORT_ALLOC: &str = "rulegate_alloc";
const EXPORT_MANIFEST: &str = "rulegate_manifest";
const EXPORT_EXECUTE: &str = "rulegate_execute";

/// Resource limits applied to every guest instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum linear memory in bytes.
    pub max_memory_bytes: usize,
    /// CPU fuel budget per guest call (prevents infinite loops).
    pub fuel_per_call: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024, // 64MB
            fuel_per_call: 1_000_000_000,        // ~1 billion instructions
        }
    }
}

/// Creates the engine shared by every module of one loader.
fn create_engine() -> Result<Engine, ArtifactHostError> {
    let mut config = wasmtime::Config::new();
    config.consume_fuel(true);
    Ok(Engine::new(&config)?)
}

/// Compiled modules by source path, shared by a loader and its open handles.
type ModuleCache = Arc<Mutex<HashMap<PathBuf, CachedModule>>>;

struct CachedModule {
    hash: String,
    module: Module,
    /// Open handles compiled from this entry.
    handles: usize,
}

/// Drops one handle's claim on the cache entry for `path`. The entry is
/// evicted once no handle compiled from the same bytes is left.
fn release(cache: &Mutex<HashMap<PathBuf, CachedModule>>, path: &Path, hash: &str) {
    let mut compiled = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = compiled.get_mut(path) else {
        return;
    };
    if entry.hash != hash {
        return;
    }
    entry.handles = entry.handles.saturating_sub(1);
    if entry.handles == 0 {
        compiled.remove(path);
        debug!(path = %path.display(), "Evicted compiled module");
    }
}

/// Opens `.wasm` and `.wat` files as artifact modules.
///
/// Compiled modules are cached per source path and reused while the file's
/// SHA-256 is unchanged, so a forced reload of an untouched file only
/// re-reads its manifest. An entry lives as long as a handle opened from it.
pub struct WasmModuleLoader {
    engine: Engine,
    limits: ResourceLimits,
    compiled: ModuleCache,
}

impl WasmModuleLoader {
    pub fn new(limits: ResourceLimits) -> Result<Self, ArtifactHostError> {
        Ok(Self {
            engine: create_engine()?,
            limits,
            compiled: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Number of compiled modules currently cached.
    pub fn cached_modules(&self) -> usize {
        self.compiled.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn compile(&self, path: &Path, bytes: &[u8]) -> Result<(String, Module), ArtifactHostError> {
        let hash = hex::encode(Sha256::digest(bytes));
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = compiled.get_mut(path) {
            if entry.hash == hash {
                debug!(path = %path.display(), "Reusing compiled module");
                entry.handles += 1;
                return Ok((hash, entry.module.clone()));
            }
        }

        let compile_start = std::time::Instant::now();
        let module = Module::new(&self.engine, bytes)?;
        info!(
            path = %path.display(),
            size_bytes = bytes.len(),
            elapsed_ms = compile_start.elapsed().as_millis(),
            "Compiled artifact module"
        );
        compiled.insert(
            path.to_path_buf(),
            CachedModule {
                hash: hash.clone(),
                module: module.clone(),
                handles: 1,
            },
        );
        Ok((hash, module))
    }

    fn read_manifest(
        &self,
        path: &Path,
        module: &Module,
    ) -> Result<HashMap<String, Arc<WasmArtifactFactory>>, ArtifactHostError> {
        let mut guest = GuestInstance::new(&self.engine, module, self.limits, &path.display().to_string())?;
        let manifest_json = guest.call_manifest()?;
        let manifest: ArtifactManifest =
            serde_json::from_str(&manifest_json).map_err(|e| ArtifactHostError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut artifacts = HashMap::with_capacity(manifest.artifacts.len());
        for descriptor in manifest.artifacts {
            let name = descriptor.name.clone();
            let factory = Arc::new(WasmArtifactFactory {
                engine: self.engine.clone(),
                module: module.clone(),
                limits: self.limits,
                descriptor: Arc::new(descriptor),
            });
            if artifacts.insert(name.clone(), factory).is_some() {
                return Err(ArtifactHostError::InvalidManifest {
                    path: path.to_path_buf(),
                    message: format!("artifact \"{name}\" is declared more than once"),
                });
            }
        }
        Ok(artifacts)
    }
}

impl ModuleLoader for WasmModuleLoader {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wasm") || ext.eq_ignore_ascii_case("wat"))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ModuleHandle>, ArtifactHostError> {
        let bytes = std::fs::read(path).map_err(|e| ArtifactHostError::ModuleLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let (hash, module) = self.compile(path, &bytes)?;

        let artifacts = match self.read_manifest(path, &module) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                release(&self.compiled, path, &hash);
                return Err(e);
            }
        };

        debug!(path = %path.display(), artifacts = artifacts.len(), "Read artifact manifest");
        Ok(Box::new(WasmModule {
            source: path.to_path_buf(),
            hash,
            cache: Arc::clone(&self.compiled),
            artifacts,
            closed: false,
        }))
    }
}

/// An opened Wasm module and the artifacts its manifest declares.
struct WasmModule {
    source: PathBuf,
    hash: String,
    cache: ModuleCache,
    artifacts: HashMap<String, Arc<WasmArtifactFactory>>,
    closed: bool,
}

impl ModuleHandle for WasmModule {
    fn artifact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn ArtifactFactory>> {
        self.artifacts
            .get(name)
            .map(|factory| Arc::clone(factory) as Arc<dyn ArtifactFactory>)
    }

    // Instances already created keep their own reference to the compiled
    // module and run to completion.
    fn close(&mut self) -> Result<(), ArtifactHostError> {
        if !self.closed {
            release(&self.cache, &self.source, &self.hash);
            self.closed = true;
        }
        Ok(())
    }
}

struct WasmArtifactFactory {
    engine: Engine,
    module: Module,
    limits: ResourceLimits,
    descriptor: Arc<ArtifactDescriptor>,
}

impl ArtifactFactory for WasmArtifactFactory {
    fn instantiate(&self) -> Result<Box<dyn Artifact>, ArtifactHostError> {
        let guest = GuestInstance::new(&self.engine, &self.module, self.limits, &self.descriptor.name)?;
        Ok(Box::new(WasmArtifact {
            descriptor: Arc::clone(&self.descriptor),
            guest,
            facts: BTreeMap::new(),
            messages: Vec::new(),
        }))
    }
}

#[derive(Serialize)]
struct GuestRequest<'a> {
    artifact: &'a str,
    mode: ArtifactKind,
    facts: &'a BTreeMap<String, FactValue>,
}

#[derive(Deserialize)]
struct GuestResponse {
    #[serde(default)]
    conclusion: Value,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    facts: BTreeMap<String, FlowFactResult>,
    #[serde(default)]
    error: Option<String>,
}

/// One artifact instance with its own store.
struct WasmArtifact {
    descriptor: Arc<ArtifactDescriptor>,
    guest: GuestInstance,
    facts: BTreeMap<String, FactValue>,
    messages: Vec<Value>,
}

impl WasmArtifact {
    fn run(&mut self, mode: ArtifactKind) -> Result<GuestResponse, ArtifactHostError> {
        let request = serde_json::to_vec(&GuestRequest {
            artifact: &self.descriptor.name,
            mode,
            facts: &self.facts,
        })?;
        let raw = self.guest.call_execute(&request)?;
        let response: GuestResponse = serde_json::from_str(&raw)?;
        match response.error {
            Some(message) => Err(ArtifactHostError::ArtifactFailed {
                artifact: self.descriptor.name.clone(),
                message,
            }),
            None => Ok(response),
        }
    }
}

impl Artifact for WasmArtifact {
    fn name(&self) -> &str {
        self.descriptor.label()
    }

    fn kind(&self) -> ArtifactKind {
        self.descriptor.kind
    }

    fn declared_fact_names(&self) -> BTreeSet<String> {
        self.descriptor.facts.keys().cloned().collect()
    }

    fn fact_shape(&self, fact: &str) -> Option<FactShape> {
        self.descriptor.facts.get(fact).cloned()
    }

    fn set_facts(&mut self, facts: BTreeMap<String, FactValue>) {
        self.facts = facts;
    }

    fn fact(&self, fact: &str) -> Option<&FactValue> {
        self.facts.get(fact)
    }

    fn execute(&mut self) -> Result<Value, ArtifactHostError> {
        let response = self.run(ArtifactKind::Decision)?;
        self.messages = response.messages;
        Ok(response.conclusion)
    }

    fn messages(&self) -> Vec<Value> {
        self.messages.clone()
    }

    fn execute_flow(&mut self) -> Result<BTreeMap<String, FlowFactResult>, ArtifactHostError> {
        let response = self.run(ArtifactKind::Flow)?;
        self.messages = response.messages;
        Ok(response.facts)
    }
}

/// State stored in each guest's `wasmtime::Store`.
struct GuestState {
    limits: StoreLimits,
}

/// An instantiated guest module with its exported memory.
struct GuestInstance {
    owner: String,
    fuel_per_call: u64,
    store: Store<GuestState>,
    instance: Instance,
    memory: Memory,
}

impl GuestInstance {
    fn new(
        engine: &Engine,
        module: &Module,
        limits: ResourceLimits,
        owner: &str,
    ) -> Result<Self, ArtifactHostError> {
        let state = GuestState {
            limits: StoreLimitsBuilder::new()
                .memory_size(limits.max_memory_bytes)
                .build(),
        };
        let mut store = Store::new(engine, state);
        store.limiter(|s| &mut s.limits);
        store.set_fuel(limits.fuel_per_call)?;

        let instance = Instance::new(&mut store, module, &[]).map_err(|e| ArtifactHostError::ArtifactTrapped {
            artifact: owner.to_string(),
            message: format!("instantiation failed: {e}"),
        })?;
        let memory = instance.get_memory(&mut store, EXPORT_MEMORY).ok_or_else(|| {
            ArtifactHostError::ArtifactFailed {
                artifact: owner.to_string(),
                message: format!("module does not export \"{EXPORT_MEMORY}\""),
            }
        })?;

        Ok(Self {
            owner: owner.to_string(),
            fuel_per_call: limits.fuel_per_call,
            store,
            instance,
            memory,
        })
    }

    fn call_manifest(&mut self) -> Result<String, ArtifactHostError> {
        self.refuel()?;
        let manifest = self
            .instance
            .get_typed_func::<(), i64>(&mut self.store, EXPORT_MANIFEST)
            .map_err(|e| self.failed(format!("missing \"{EXPORT_MANIFEST}\" export: {e}")))?;
        let packed = manifest
            .call(&mut self.store, ())
            .map_err(|e| self.trapped(e))?;
        self.read_packed(packed)
    }

    fn call_execute(&mut self, request: &[u8]) -> Result<String, ArtifactHostError> {
        self.refuel()?;
        let len = i32::try_from(request.len())
            .map_err(|_| self.failed(format!("request of {} bytes is too large", request.len())))?;

        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&mut self.store, EXPORT_ALLOC)
            .map_err(|e| self.failed(format!("missing \"{EXPORT_ALLOC}\" export: {e}")))?;
        let execute = self
            .instance
            .get_typed_func::<(i32, i32), i64>(&mut self.store, EXPORT_EXECUTE)
            .map_err(|e| self.failed(format!("missing \"{EXPORT_EXECUTE}\" export: {e}")))?;

        let ptr = alloc.call(&mut self.store, len).map_err(|e| self.trapped(e))?;
        let offset = usize::try_from(ptr).map_err(|_| self.failed(format!("negative pointer {ptr}")))?;
        self.memory
            .write(&mut self.store, offset, request)
            .map_err(|e| self.failed(format!("request write out of bounds: {e}")))?;

        let packed = execute
            .call(&mut self.store, (ptr, len))
            .map_err(|e| self.trapped(e))?;
        self.read_packed(packed)
    }

    fn read_packed(&self, packed: i64) -> Result<String, ArtifactHostError> {
        let packed = packed as u64;
        let ptr = (packed >> 32) as usize;
        let len = (packed & 0xffff_ffff) as usize;

        let bytes = self
            .memory
            .data(&self.store)
            .get(ptr..ptr + len)
            .ok_or_else(|| self.failed(format!("result at {ptr}+{len} is out of bounds")))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| self.failed(format!("result is not UTF-8: {e}")))
    }

    fn refuel(&mut self) -> Result<(), ArtifactHostError> {
        Ok(self.store.set_fuel(self.fuel_per_call)?)
    }

    fn failed(&self, message: String) -> ArtifactHostError {
        ArtifactHostError::ArtifactFailed {
            artifact: self.owner.clone(),
            message,
        }
    }

    fn trapped(&self, error: wasmtime::Error) -> ArtifactHostError {
        ArtifactHostError::ArtifactTrapped {
            artifact: self.owner.clone(),
            message: error.to_string(),
        }
    }
}
