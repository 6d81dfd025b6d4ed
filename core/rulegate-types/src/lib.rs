//! Core fact types for rulegate.
//!
//! This crate defines the artifact-agnostic vocabulary shared by the host
//! and the executor:
//! - Fact kinds, declared fact shapes and typed fact values
//! - Raw caller input as it arrives from JSON request bodies
//! - Fact name normalization into accessor identifiers
//! - Coercion of raw strings into typed fact values
//!
//! Nothing here knows how artifacts are packaged or loaded.

mod coerce;
mod fact;
mod normalize;

pub use coerce::{BooleanParsing, TypeCoercer, DEFAULT_DATETIME_FORMAT};
pub use fact::{FactKind, FactShape, FactValue, RawFact};
pub use normalize::normalize;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, FactError>;

/// Errors raised while normalizing or coercing caller-supplied facts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("fact name must contain at least one alphanumeric character")]
    EmptyName,

    #[error("could not coerce value {value} of fact \"{fact}\" to {expected}: {reason}")]
    Coercion {
        fact: String,
        value: String,
        expected: String,
        reason: String,
    },

    #[error("could not find any supported type for fact \"{fact}\" of type \"{kind}\"")]
    UnsupportedFactType { fact: String, kind: String },
}
