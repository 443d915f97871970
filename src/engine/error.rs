//! Engine-specific error types.

use crate::types::PropertyKind;
use thiserror::Error;

/// Errors that can occur inside a media engine implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Failed to build pipeline: {0}")]
    Build(String),

    #[error("No component named '{0}'")]
    ComponentNotFound(String),

    #[error("Component '{component}' has no property '{property}'")]
    PropertyNotFound { component: String, property: String },

    #[error("Property '{component}.{property}' is not writable")]
    PropertyNotWritable { component: String, property: String },

    #[error("Property '{component}.{property}' expects {expected}")]
    TypeMismatch {
        component: String,
        property: String,
        expected: PropertyKind,
    },

    #[error("Value {value} is out of range for '{component}.{property}'")]
    OutOfRange {
        component: String,
        property: String,
        value: String,
    },

    #[error("State change to {target} failed: {reason}")]
    StateChange {
        target: crate::types::RunState,
        reason: String,
    },

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
