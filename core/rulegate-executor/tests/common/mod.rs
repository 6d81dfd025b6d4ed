//! Test helpers: a loader whose `.wasm` files are JSON module descriptions,
//! and artifacts that record what they were bound with.

#![allow(dead_code)]

use rulegate_artifact_host::*;
use rulegate_executor::{ExecutionOrchestrator, ExecutorConfig};
use rulegate_types::{FactShape, FactValue};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct Recorder {
    pub executions: AtomicUsize,
    pub bound: Mutex<Vec<BTreeMap<String, FactValue>>>,
}

impl Recorder {
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn last_bound(&self) -> BTreeMap<String, FactValue> {
        self.bound.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ModuleFile {
    #[serde(flatten)]
    manifest: ArtifactManifest,
    #[serde(default)]
    conclusion: Value,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    flow: BTreeMap<String, FlowFactResult>,
}

struct JsonLoader {
    recorder: Arc<Recorder>,
}

impl ModuleLoader for JsonLoader {
    fn accepts(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e.eq_ignore_ascii_case("wasm"))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ModuleHandle>, ArtifactHostError> {
        let file: ModuleFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Box::new(JsonModule {
            file: Arc::new(file),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

struct JsonModule {
    file: Arc<ModuleFile>,
    recorder: Arc<Recorder>,
}

impl ModuleHandle for JsonModule {
    fn artifact_names(&self) -> Vec<String> {
        self.file.manifest.artifacts.iter().map(|a| a.name.clone()).collect()
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn ArtifactFactory>> {
        let descriptor = self.file.manifest.artifacts.iter().find(|a| a.name == name)?;
        Some(Arc::new(JsonFactory {
            descriptor: descriptor.clone(),
            file: Arc::clone(&self.file),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

struct JsonFactory {
    descriptor: ArtifactDescriptor,
    file: Arc<ModuleFile>,
    recorder: Arc<Recorder>,
}

impl ArtifactFactory for JsonFactory {
    fn instantiate(&self) -> Result<Box<dyn Artifact>, ArtifactHostError> {
        Ok(Box::new(RecordingArtifact {
            descriptor: self.descriptor.clone(),
            file: Arc::clone(&self.file),
            recorder: Arc::clone(&self.recorder),
            facts: BTreeMap::new(),
        }))
    }
}

struct RecordingArtifact {
    descriptor: ArtifactDescriptor,
    file: Arc<ModuleFile>,
    recorder: Arc<Recorder>,
    facts: BTreeMap<String, FactValue>,
}

impl RecordingArtifact {
    fn record(&self) {
        self.recorder.executions.fetch_add(1, Ordering::SeqCst);
        self.recorder.bound.lock().unwrap().push(self.facts.clone());
    }
}

impl Artifact for RecordingArtifact {
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
        self.record();
        Ok(self.file.conclusion.clone())
    }

    fn messages(&self) -> Vec<Value> {
        self.file.messages.clone()
    }

    fn execute_flow(&mut self) -> Result<BTreeMap<String, FlowFactResult>, ArtifactHostError> {
        self.record();
        Ok(self.file.flow.clone())
    }
}

pub fn write_module(dir: &Path, relative: &str, module: Value) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, module.to_string()).unwrap();
    path
}

/// Orchestrator over the JSON loader, with default templates and
/// `artifacts_location` as its default location.
pub fn orchestrator(artifacts_location: &Path) -> (ExecutionOrchestrator, Arc<Recorder>) {
    let config = ExecutorConfig {
        artifacts_location: artifacts_location.to_path_buf(),
        ..ExecutorConfig::default()
    };
    let recorder = Arc::new(Recorder::default());
    let loader = JsonLoader {
        recorder: Arc::clone(&recorder),
    };
    let registry = ArtifactRegistry::new(Arc::new(loader), &config.artifacts_location);
    let orchestrator = ExecutionOrchestrator::new(
        Arc::new(registry),
        FactBinder::new(config.coercer()),
        config.name_templates(),
    );
    (orchestrator, recorder)
}

pub fn facts(value: Value) -> BTreeMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

pub fn wasm_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../rulegate-artifact-host/tests/fixtures")
        .join(name)
}
