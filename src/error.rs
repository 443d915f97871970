//! Error handling for pipectl
//!
//! This module defines the crate-level error type and a Result alias. Engine
//! failures have their own type in [`crate::engine::EngineError`] and convert
//! into [`PlayerError`] when they cross the controller boundary.

use crate::engine::EngineError;
use thiserror::Error;

/// Main error type for controller operations
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The dedicated worker thread could not be created
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The worker thread is gone (destroyed or panicked)
    #[error("Controller worker is not running")]
    Disconnected,

    /// A blocking call was made from the controller's own worker thread
    #[error("Blocking controller call from its own worker thread")]
    Reentrant,

    /// No pipeline is currently built
    #[error("No pipeline")]
    NoPipeline,

    /// Errors reported by the media engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl<T> From<crossbeam_channel::SendError<T>> for PlayerError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        PlayerError::Disconnected
    }
}

impl From<crossbeam_channel::RecvError> for PlayerError {
    fn from(_: crossbeam_channel::RecvError) -> Self {
        PlayerError::Disconnected
    }
}

/// Result type alias for pipectl operations
pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlayerError::Config("missing controller table".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing controller table"
        );
    }

    #[test]
    fn test_engine_error_converts() {
        let err: PlayerError = EngineError::ComponentNotFound("v".to_string()).into();
        assert!(matches!(err, PlayerError::Engine(EngineError::ComponentNotFound(_))));
        assert!(err.to_string().starts_with("Engine error"));
        assert!(err.to_string().contains("'v'"));
    }

    #[test]
    fn test_channel_errors_map_to_disconnected() {
        let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
        drop(rx);
        let err: PlayerError = tx.send(1).unwrap_err().into();
        assert!(matches!(err, PlayerError::Disconnected));
    }
}
