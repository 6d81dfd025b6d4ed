//! Wasmtime-based artifact host for rulegate.
//!
//! Loads decision and flow artifacts packaged as WebAssembly modules,
//! keeps them in a hot-swappable registry keyed by source path, and binds
//! loosely-typed caller input into the typed facts an artifact declares.
//!
//! Each execution instantiates its artifact in a fresh `wasmtime::Store`
//! with its own memory ceiling and CPU fuel budget.

mod artifact;
mod binder;
mod error;
mod module;
mod registry;
mod sandbox;

pub use artifact::{
    Artifact, ArtifactDescriptor, ArtifactFactory, ArtifactKind, ArtifactManifest, ArtifactType,
    FlowFactResult, RowHit,
};
pub use binder::{FactBinder, FactBinding};
pub use error::ArtifactHostError;
pub use module::{ModuleHandle, ModuleInfo, ModuleLoader};
pub use registry::ArtifactRegistry;
pub use sandbox::{ResourceLimits, WasmModuleLoader};
