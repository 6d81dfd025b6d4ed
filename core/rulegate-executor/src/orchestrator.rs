//! Resolve, refresh, instantiate, bind, execute.
//!
//! Every execution first rescans the default artifacts location so modules
//! dropped there are picked up without a restart, then resolves the
//! qualified name built from the request and runs a fresh instance.

use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};
use crate::naming::NameTemplates;
use crate::outcome::{retain_meaningful, DecisionOutcome};
use rulegate_artifact_host::{
    Artifact, ArtifactHostError, ArtifactKind, ArtifactRegistry, FactBinder, FlowFactResult,
    ModuleInfo, WasmModuleLoader,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Steps of one execution, reported as debug events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Refreshing,
    Resolving,
    Instantiating,
    Binding,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionPhase::Refreshing => "refreshing",
            ExecutionPhase::Resolving => "resolving",
            ExecutionPhase::Instantiating => "instantiating",
            ExecutionPhase::Binding => "binding",
            ExecutionPhase::Executing => "executing",
            ExecutionPhase::Done => "done",
            ExecutionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct ExecutionOrchestrator {
    registry: Arc<ArtifactRegistry>,
    binder: FactBinder,
    templates: NameTemplates,
}

impl ExecutionOrchestrator {
    pub fn new(registry: Arc<ArtifactRegistry>, binder: FactBinder, templates: NameTemplates) -> Self {
        Self {
            registry,
            binder,
            templates,
        }
    }

    /// Builds a Wasmtime-backed orchestrator. The registry starts empty.
    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        let loader = WasmModuleLoader::new(config.limits)?;
        let registry = ArtifactRegistry::new(Arc::new(loader), &config.artifacts_location);
        Ok(Self::new(
            Arc::new(registry),
            FactBinder::new(config.coercer()),
            config.name_templates(),
        ))
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    // ================================================================
    // Execution
    // ================================================================

    pub fn execute_decision(
        &self,
        prefix: &str,
        conclusion: &str,
        view: &str,
        version: &str,
        facts: &BTreeMap<String, Value>,
    ) -> Result<DecisionOutcome> {
        let name = self.templates.decision_name(prefix, conclusion, view, version);
        let target = format!(
            "decision of conclusion \"{conclusion}\", view \"{view}\" and version \"{version}\" on prefix \"{prefix}\""
        );

        let outcome = self.prepare(&name, target, ArtifactKind::Decision, facts).and_then(|mut artifact| {
            debug!(phase = %ExecutionPhase::Executing, artifact = %name);
            let conclusion = artifact.execute()?;
            Ok(DecisionOutcome {
                conclusion,
                messages: artifact.messages(),
            })
        });
        finish(&name, outcome)
    }

    /// Runs a flow and returns its results without empty values.
    pub fn execute_flow(
        &self,
        prefix: &str,
        flow: &str,
        version: &str,
        facts: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, FlowFactResult>> {
        let name = self.templates.flow_name(prefix, flow, version);
        let target = format!("flow \"{flow}\" and version \"{version}\" on prefix \"{prefix}\"");

        let results = self.prepare(&name, target, ArtifactKind::Flow, facts).and_then(|mut artifact| {
            debug!(phase = %ExecutionPhase::Executing, artifact = %name);
            Ok(retain_meaningful(artifact.execute_flow()?))
        });
        finish(&name, results)
    }

    fn prepare(
        &self,
        name: &str,
        target: String,
        expected: ArtifactKind,
        facts: &BTreeMap<String, Value>,
    ) -> Result<Box<dyn Artifact>> {
        debug!(phase = %ExecutionPhase::Refreshing, artifact = %name);
        self.refresh()?;

        debug!(phase = %ExecutionPhase::Resolving, artifact = %name);
        let artifact_type = match self.registry.resolve_type(name) {
            Ok(artifact_type) => artifact_type,
            Err(ArtifactHostError::ArtifactNotFound(_)) => {
                return Err(ExecutorError::ArtifactNotFound {
                    target,
                    qualified_name: name.to_string(),
                    location: self.default_location(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        debug!(phase = %ExecutionPhase::Instantiating, artifact = %name, source = %artifact_type.source().display());
        let mut artifact = artifact_type.instantiate()?;
        if artifact.kind() != expected {
            return Err(ExecutorError::WrongArtifactKind {
                artifact: name.to_string(),
                expected,
                actual: artifact.kind(),
            });
        }

        debug!(phase = %ExecutionPhase::Binding, artifact = %name, facts = facts.len());
        self.binder.bind(facts, artifact.as_mut())?;
        Ok(artifact)
    }

    /// Picks up modules added to the default location since the last scan.
    fn refresh(&self) -> Result<()> {
        match self.registry.load_from_default_location(false) {
            Ok(_) => Ok(()),
            Err(ArtifactHostError::MissingLocation { .. }) if !self.registry.is_empty() => Ok(()),
            Err(ArtifactHostError::MissingLocation { .. }) => Err(ExecutorError::NoArtifactsAvailable {
                location: self.default_location(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ================================================================
    // Administration
    // ================================================================

    /// Loads modules from `path` and describes the result.
    pub fn reload_from(&self, path: impl AsRef<Path>, force_reload: bool) -> Result<String> {
        let path = path.as_ref();
        let loaded = self.registry.load_from(path, force_reload)?;
        Ok(format!("Loaded {loaded} artifacts from {}", absolute(path).display()))
    }

    pub fn reload_default(&self, force_reload: bool) -> Result<String> {
        let loaded = self.registry.load_from_default_location(force_reload)?;
        Ok(format!(
            "Loaded {loaded} artifacts from default path (\"{}\")",
            self.default_location().display()
        ))
    }

    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.registry.modules()
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }

    fn default_location(&self) -> PathBuf {
        absolute(self.registry.default_location())
    }
}

fn finish<T>(name: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => {
            debug!(phase = %ExecutionPhase::Done, artifact = %name);
            info!(artifact = %name, "Executed artifact");
        }
        Err(e) => {
            debug!(phase = %ExecutionPhase::Failed, artifact = %name);
            warn!(artifact = %name, "Execution failed: {}", e);
        }
    }
    result
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
