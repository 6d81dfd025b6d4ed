//! The artifact capability contract.
//!
//! An artifact is a decision or flow unit with named, typed facts and an
//! execute operation. The host never introspects artifacts: everything it
//! needs is asked for through [`Artifact`].

use crate::error::ArtifactHostError;
use rulegate_types::{FactShape, FactValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Decision,
    Flow,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Decision => f.write_str("decision"),
            ArtifactKind::Flow => f.write_str("flow"),
        }
    }
}

/// A diagnostic record naming the rule row that contributed to a flow fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowHit {
    pub row: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

/// One named result of a flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowFactResult {
    #[serde(default)]
    pub value: Value,
    /// Row hits grouped by the rule table that produced them.
    #[serde(default)]
    pub row_hits: BTreeMap<String, Vec<RowHit>>,
}

/// Static description of one artifact inside a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Fully-qualified name used for resolution.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: ArtifactKind,
    #[serde(default)]
    pub facts: BTreeMap<String, FactShape>,
}

impl ArtifactDescriptor {
    /// Display label; defaults to the last segment of the qualified name.
    pub fn label(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| self.name.rsplit('.').next().unwrap_or(&self.name))
    }
}

/// The artifact list a module publishes about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    #[serde(default)]
    pub artifacts: Vec<ArtifactDescriptor>,
}

/// A live, executable artifact instance.
///
/// Instances are never shared between executions.
pub trait Artifact: Send {
    /// Human-readable artifact label, used in diagnostics.
    fn name(&self) -> &str;

    fn kind(&self) -> ArtifactKind;

    /// Names of every fact this artifact accepts, in accessor form.
    fn declared_fact_names(&self) -> BTreeSet<String>;

    /// Declared type of the accessor for `fact`, if there is one.
    fn fact_shape(&self, fact: &str) -> Option<FactShape>;

    /// Replaces the bound facts with `facts` in one step.
    fn set_facts(&mut self, facts: BTreeMap<String, FactValue>);

    /// Currently bound value of `fact`.
    fn fact(&self, fact: &str) -> Option<&FactValue>;

    /// Runs a decision and returns its conclusion.
    fn execute(&mut self) -> Result<Value, ArtifactHostError>;

    /// Diagnostic messages produced by the last [`Artifact::execute`].
    fn messages(&self) -> Vec<Value>;

    /// Runs a flow and returns its named results.
    fn execute_flow(&mut self) -> Result<BTreeMap<String, FlowFactResult>, ArtifactHostError>;
}

/// Creates fresh instances of one artifact type.
pub trait ArtifactFactory: Send + Sync {
    fn instantiate(&self) -> Result<Box<dyn Artifact>, ArtifactHostError>;
}

/// A resolved artifact type and the module it was found in.
#[derive(Clone)]
pub struct ArtifactType {
    name: String,
    source: PathBuf,
    factory: Arc<dyn ArtifactFactory>,
}

impl ArtifactType {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        factory: Arc<dyn ArtifactFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the module that defines this type.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn instantiate(&self) -> Result<Box<dyn Artifact>, ArtifactHostError> {
        self.factory.instantiate()
    }
}

impl fmt::Debug for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactType")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
