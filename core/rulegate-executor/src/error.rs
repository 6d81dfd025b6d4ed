//! Error types for decision and flow execution.

use rulegate_artifact_host::{ArtifactHostError, ArtifactKind};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ExecutorError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(
        "unable to execute any artifact: default artifacts location \"{}\" is missing or empty \
         and no other location was loaded. Add artifact modules to that location or call \
         \"reload/artifacts/jars/from/{{path}}\" for a different path",
        location.display()
    )]
    NoArtifactsAvailable { location: PathBuf },

    #[error(
        "{target} was not found (looked up as \"{qualified_name}\"). Make sure the above is accurate \
         and the artifact modules are located in the configured artifacts location \
         (\"{}\" by default)",
        location.display()
    )]
    ArtifactNotFound {
        /// What the caller asked for, e.g. `decision of conclusion "X", view "Y" ...`.
        target: String,
        qualified_name: String,
        location: PathBuf,
    },

    #[error("artifact \"{artifact}\" is a {actual}, not a {expected}")]
    WrongArtifactKind {
        artifact: String,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Host(#[from] ArtifactHostError),
}
