//! Executor configuration, read from `rulegate.toml` and the environment.

use crate::error::{ExecutorError, Result};
use crate::naming::NameTemplates;
use rulegate_artifact_host::ResourceLimits;
use rulegate_types::{BooleanParsing, TypeCoercer, DEFAULT_DATETIME_FORMAT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Overrides `artifacts_location`.
pub const ENV_ARTIFACTS_DIR: &str = "RULEGATE_ARTIFACTS_DIR";
/// Overrides `datetime_format`.
pub const ENV_DATETIME_FORMAT: &str = "RULEGATE_DATETIME_FORMAT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Directory scanned before every execution.
    pub artifacts_location: PathBuf,
    /// Qualified-name template of decisions; the conclusion is appended.
    pub decision_name_template: String,
    /// Qualified-name template of flows; the flow name is appended.
    pub flow_name_template: String,
    pub view_placeholder: String,
    pub prefix_placeholder: String,
    pub version_placeholder: String,
    /// Replaces every `.` of a version before substitution.
    pub version_dot_replacement: String,
    /// `chrono` strftime pattern for timestamp facts.
    pub datetime_format: String,
    /// Reject boolean facts other than `true`/`false`.
    pub strict_booleans: bool,
    pub limits: ResourceLimits,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            artifacts_location: PathBuf::from("artifacts"),
            decision_name_template: "{prefix}.decisions.{view}.v{version}".to_string(),
            flow_name_template: "{prefix}.flows.v{version}".to_string(),
            view_placeholder: "{view}".to_string(),
            prefix_placeholder: "{prefix}".to_string(),
            version_placeholder: "{version}".to_string(),
            version_dot_replacement: "_".to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            strict_booleans: false,
            limits: ResourceLimits::default(),
        }
    }
}

impl ExecutorConfig {
    /// Parses a TOML config file. Keys it omits keep their defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |message: String| ExecutorError::Config {
            path: path.to_path_buf(),
            message,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config: Self = toml::from_str(&contents).map_err(|e| config_error(e.to_string()))?;
        info!(path = %path.display(), "Loaded executor configuration");
        Ok(config)
    }

    /// Loads `path` if given, otherwise the defaults, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies `RULEGATE_*` overrides looked up through `lookup`.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_ARTIFACTS_DIR).filter(|v| !v.is_empty()) {
            self.artifacts_location = PathBuf::from(dir);
        }
        if let Some(format) = lookup(ENV_DATETIME_FORMAT).filter(|v| !v.is_empty()) {
            self.datetime_format = format;
        }
        self
    }

    pub fn coercer(&self) -> TypeCoercer {
        let booleans = if self.strict_booleans {
            BooleanParsing::Strict
        } else {
            BooleanParsing::Permissive
        };
        TypeCoercer::new(&self.datetime_format).with_boolean_parsing(booleans)
    }

    pub fn name_templates(&self) -> NameTemplates {
        NameTemplates {
            decision: self.decision_name_template.clone(),
            flow: self.flow_name_template.clone(),
            view_placeholder: self.view_placeholder.clone(),
            prefix_placeholder: self.prefix_placeholder.clone(),
            version_placeholder: self.version_placeholder.clone(),
            version_dot_replacement: self.version_dot_replacement.clone(),
        }
    }
}
