//! Decision and flow execution for rulegate.
//!
//! Turns a request (prefix, name, view, version and raw facts) into a
//! qualified artifact name, refreshes the registry from the default
//! location, binds the facts into a fresh artifact instance and runs it.

mod config;
mod error;
mod naming;
mod orchestrator;
mod outcome;

pub use config::{ExecutorConfig, ENV_ARTIFACTS_DIR, ENV_DATETIME_FORMAT};
pub use error::{ExecutorError, Result};
pub use naming::NameTemplates;
pub use orchestrator::{ExecutionOrchestrator, ExecutionPhase};
pub use outcome::{retain_meaningful, DecisionOutcome};
