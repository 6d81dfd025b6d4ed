//! Binds caller-supplied facts into an artifact instance.

use crate::artifact::Artifact;
use crate::error::ArtifactHostError;
use rulegate_types::{normalize, FactKind, FactShape, FactValue, RawFact, TypeCoercer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A coerced fact, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct FactBinding {
    pub name: String,
    pub value: FactValue,
    pub shape: FactShape,
}

#[derive(Debug, Clone, Default)]
pub struct FactBinder {
    coercer: TypeCoercer,
}

impl FactBinder {
    pub fn new(coercer: TypeCoercer) -> Self {
        Self { coercer }
    }

    pub fn coercer(&self) -> &TypeCoercer {
        &self.coercer
    }

    /// Validates, coerces and commits `raw_facts` into `artifact`.
    ///
    /// The artifact is left untouched unless every fact binds.
    pub fn bind(
        &self,
        raw_facts: &BTreeMap<String, Value>,
        artifact: &mut dyn Artifact,
    ) -> Result<(), ArtifactHostError> {
        let bindings = self.prepare(raw_facts, &*artifact)?;
        debug!(artifact = %artifact.name(), facts = bindings.len(), "Binding facts");

        let facts: BTreeMap<String, FactValue> = bindings
            .into_iter()
            .map(|binding| (binding.name, binding.value))
            .collect();
        artifact.set_facts(facts);
        Ok(())
    }

    /// Resolves every raw fact against the artifact's declared facts
    /// without binding anything.
    pub fn prepare(
        &self,
        raw_facts: &BTreeMap<String, Value>,
        artifact: &dyn Artifact,
    ) -> Result<Vec<FactBinding>, ArtifactHostError> {
        let declared = artifact.declared_fact_names();

        let mut names = Vec::with_capacity(raw_facts.len());
        for raw_name in raw_facts.keys() {
            let name = normalize(raw_name, true)?;
            if !declared.contains(&name) {
                return Err(ArtifactHostError::UnknownFact {
                    fact: name,
                    artifact: artifact.name().to_string(),
                    available: declared.into_iter().collect(),
                });
            }
            names.push(name);
        }

        names
            .into_iter()
            .zip(raw_facts.iter())
            .map(|(name, (raw_name, raw_value))| {
                let shape = artifact.fact_shape(&name).ok_or_else(|| {
                    ArtifactHostError::SchemaMismatch {
                        fact: name.clone(),
                        detail: "the artifact declares no accessor for it".to_string(),
                    }
                })?;
                let raw = RawFact::from_json(raw_name, raw_value)?;
                let value = self.coerce(&name, &raw, &shape)?;
                Ok(FactBinding { name, value, shape })
            })
            .collect()
    }

    fn coerce(
        &self,
        name: &str,
        raw: &RawFact,
        shape: &FactShape,
    ) -> Result<FactValue, ArtifactHostError> {
        match shape {
            FactShape::Scalar { kind } => {
                let kind = FactKind::resolve(name, kind)?;
                Ok(self.coercer.coerce(name, raw.as_single(name, kind)?, kind)?)
            }
            FactShape::List {
                member: Some(member),
            } => {
                let member = FactKind::resolve(name, member)?;
                Ok(self
                    .coercer
                    .coerce_list(name, raw.as_many(name, member)?, member)?)
            }
            FactShape::List { member: None } => Err(ArtifactHostError::SchemaMismatch {
                fact: name.to_string(),
                detail: "list fact has no member appender".to_string(),
            }),
        }
    }
}
