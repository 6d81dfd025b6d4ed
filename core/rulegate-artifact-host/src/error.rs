//! Error types for the artifact host.

use rulegate_types::FactError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactHostError {
    #[error("file or directory \"{}\" does not exist or is empty", path.display())]
    MissingLocation { path: PathBuf },

    #[error("could not find artifact \"{0}\" in any loaded module")]
    ArtifactNotFound(String),

    #[error(
        "given fact name \"{fact}\" was not found on the requested artifact \"{artifact}\"; \
         the available facts to set are: {available:?}"
    )]
    UnknownFact {
        fact: String,
        artifact: String,
        available: Vec<String>,
    },

    #[error("schema mismatch for fact \"{fact}\": {detail}")]
    SchemaMismatch { fact: String, detail: String },

    #[error(transparent)]
    Fact(#[from] FactError),

    #[error("wasm compilation error: {0}")]
    Compilation(#[from] wasmtime::Error),

    #[error("failed to load module \"{}\": {message}", path.display())]
    ModuleLoad { path: PathBuf, message: String },

    #[error("invalid artifact manifest in \"{}\": {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("artifact '{artifact}' trapped: {message}")]
    ArtifactTrapped { artifact: String, message: String },

    #[error("artifact '{artifact}' failed: {message}")]
    ArtifactFailed { artifact: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
