//! Shared test helpers for artifact host tests.
//!
//! `FakeLoader` reads `.wasm` files that actually hold a JSON description
//! of the module, so registry behavior can be tested without compiling
//! guest code.

#![allow(dead_code)]

use rulegate_artifact_host::*;
use rulegate_types::{FactShape, FactValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub instantiated: AtomicUsize,
    pub executed: AtomicUsize,
}

impl Stats {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FakeModuleFile {
    #[serde(flatten)]
    manifest: ArtifactManifest,
    /// Conclusion returned by every decision of the module.
    #[serde(default)]
    conclusion: Value,
    /// A locked module refuses to close.
    #[serde(default)]
    locked: bool,
}

#[derive(Default)]
pub struct FakeLoader {
    pub stats: Arc<Stats>,
}

impl ModuleLoader for FakeLoader {
    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wasm"))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ModuleHandle>, ArtifactHostError> {
        let text = std::fs::read_to_string(path)?;
        let file: FakeModuleFile =
            serde_json::from_str(&text).map_err(|e| ArtifactHostError::ModuleLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeModule {
            source: path.to_path_buf(),
            file,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeModule {
    source: PathBuf,
    file: FakeModuleFile,
    stats: Arc<Stats>,
}

impl ModuleHandle for FakeModule {
    fn artifact_names(&self) -> Vec<String> {
        self.file.manifest.artifacts.iter().map(|a| a.name.clone()).collect()
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn ArtifactFactory>> {
        let descriptor = self.file.manifest.artifacts.iter().find(|a| a.name == name)?;
        Some(Arc::new(FakeFactory {
            descriptor: descriptor.clone(),
            conclusion: self.file.conclusion.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }

    fn close(&mut self) -> Result<(), ArtifactHostError> {
        if self.file.locked {
            return Err(ArtifactHostError::ModuleLoad {
                path: self.source.clone(),
                message: "module is in use".to_string(),
            });
        }
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeFactory {
    descriptor: ArtifactDescriptor,
    conclusion: Value,
    stats: Arc<Stats>,
}

impl ArtifactFactory for FakeFactory {
    fn instantiate(&self) -> Result<Box<dyn Artifact>, ArtifactHostError> {
        self.stats.instantiated.fetch_add(1, Ordering::SeqCst);
        let mut artifact = TestArtifact::new(&self.descriptor.name, self.descriptor.facts.clone());
        artifact.conclusion = self.conclusion.clone();
        artifact.stats = Some(Arc::clone(&self.stats));
        Ok(Box::new(artifact))
    }
}

/// In-memory artifact with a fixed fact schema.
pub struct TestArtifact {
    pub label: String,
    pub kind: ArtifactKind,
    pub declared: BTreeSet<String>,
    pub shapes: BTreeMap<String, FactShape>,
    pub facts: BTreeMap<String, FactValue>,
    pub set_calls: usize,
    pub conclusion: Value,
    pub flow: BTreeMap<String, FlowFactResult>,
    pub stats: Option<Arc<Stats>>,
}

impl TestArtifact {
    pub fn new(label: &str, shapes: BTreeMap<String, FactShape>) -> Self {
        Self {
            label: label.to_string(),
            kind: ArtifactKind::Decision,
            declared: shapes.keys().cloned().collect(),
            shapes,
            facts: BTreeMap::new(),
            set_calls: 0,
            conclusion: Value::Null,
            flow: BTreeMap::new(),
            stats: None,
        }
    }
}

impl Artifact for TestArtifact {
    fn name(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    fn declared_fact_names(&self) -> BTreeSet<String> {
        self.declared.clone()
    }

    fn fact_shape(&self, fact: &str) -> Option<FactShape> {
        self.shapes.get(fact).cloned()
    }

    fn set_facts(&mut self, facts: BTreeMap<String, FactValue>) {
        self.set_calls += 1;
        self.facts = facts;
    }

    fn fact(&self, fact: &str) -> Option<&FactValue> {
        self.facts.get(fact)
    }

    fn execute(&mut self) -> Result<Value, ArtifactHostError> {
        if let Some(stats) = &self.stats {
            stats.executed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self.conclusion.clone())
    }

    fn messages(&self) -> Vec<Value> {
        Vec::new()
    }

    fn execute_flow(&mut self) -> Result<BTreeMap<String, FlowFactResult>, ArtifactHostError> {
        Ok(self.flow.clone())
    }
}

/// Writes a fake module under `dir` defining `names`, each concluding `tag`.
pub fn write_module(dir: &Path, relative: &str, names: &[&str], tag: &str) -> PathBuf {
    let artifacts: Vec<Value> = names
        .iter()
        .map(|name| serde_json::json!({ "name": name, "kind": "decision" }))
        .collect();
    write_raw(
        dir,
        relative,
        &serde_json::json!({ "artifacts": artifacts, "conclusion": tag }).to_string(),
    )
}

pub fn write_raw(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn fake_registry(default_location: &Path) -> (ArtifactRegistry, Arc<Stats>) {
    let loader = FakeLoader::default();
    let stats = Arc::clone(&loader.stats);
    (ArtifactRegistry::new(Arc::new(loader), default_location), stats)
}

/// Resolves `name`, instantiates it and returns its conclusion.
pub fn conclusion_of(registry: &ArtifactRegistry, name: &str) -> Value {
    let ty = registry.resolve_type(name).unwrap();
    ty.instantiate().unwrap().execute().unwrap()
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}
