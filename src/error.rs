use thiserror::Error;

/// Central error type for roster operations.
///
/// Scheduling itself degrades to empty or neutral results instead of failing;
/// this type covers lookups, storage I/O, configuration and the server.
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Pattern not found: {0}")]
    PatternNotFound(uuid::Uuid),

    #[error("Shift not found: {0}")]
    ShiftNotFound(uuid::Uuid),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid shift: {0}")]
    InvalidShift(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for roster results.
pub type RosterResult<T> = Result<T, RosterError>;
