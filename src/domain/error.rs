//! Domain error types.
//!
//! Three taxonomies, one per pipeline stage: [`NormalizeError`] (blocking, no
//! canonical produced), [`ValidationError`] (schema violation at the trust
//! boundary), [`ReplayError`] (structurally broken event stream). All are
//! reported as values; a panic anywhere in the core is a programming bug.

use crate::domain::canonical::Pattern;

/// Blocking failures while turning freeform fragments into a candidate record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unknown instrument '{input}': not a recognized symbol or alias")]
    UnknownInstrument { input: String },

    #[error("entry rules do not match any supported pattern")]
    UnknownPattern,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Structural or semantic schema violations in a candidate canonical record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field {field}")]
    Missing { field: &'static str },

    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("risk percent {value} exceeds the hard ceiling of {ceiling} percent")]
    RiskCeilingExceeded { value: f64, ceiling: f64 },
}

/// Structural problems in an event stream. Reported, never thrown: a replay
/// failure in a correctly wired system is evidence of an upstream bug.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("event log is empty")]
    EmptyLog,

    #[error("first event must be a strategy creation, found {found}")]
    FirstEventNotCreation { found: &'static str },

    #[error("unrecognized parameter path '{path}'")]
    UnknownPath { path: String },

    #[error("parameter path '{path}' does not apply to pattern {pattern}")]
    PathPatternMismatch {
        path: &'static str,
        pattern: Pattern,
    },

    #[error("invalid value for '{path}': {reason}")]
    InvalidValue { path: &'static str, reason: String },
}

/// Top-level error type for stratagem.
#[derive(Debug, thiserror::Error)]
pub enum StratagemError {
    #[error("input parse error in {file}: {reason}")]
    InputParse { file: String, reason: String },

    #[error("normalization failed with {count} error(s)", count = errors.len())]
    Normalize { errors: Vec<NormalizeError> },

    #[error("validation failed with {count} error(s)", count = errors.len())]
    Validation { errors: Vec<ValidationError> },

    #[error(transparent)]
    Replay(#[from] crate::domain::replay::ReplayFailure),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratagemError> for std::process::ExitCode {
    fn from(err: &StratagemError) -> Self {
        let code: u8 = match err {
            StratagemError::Io(_) => 1,
            StratagemError::InputParse { .. } => 2,
            StratagemError::Normalize { .. } => 3,
            StratagemError::Validation { .. } => 4,
            StratagemError::Replay(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
