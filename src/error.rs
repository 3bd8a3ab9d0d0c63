//! Error types for the engine and its host-side collaborators

use std::path::PathBuf;

/// Rejection reasons for a logic-reference assignment.
///
/// These are input-validation outcomes. The session controller turns them
/// into an error blink on the offending row; they never escape an event
/// handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LogicError {
    #[error("a row cannot reference itself")]
    SelfReference,

    #[error("reference would close a cycle")]
    CircularReference,

    #[error("too many rows carry a logic reference")]
    CapacityExceeded,
}

/// Error type for the YAML preset store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Error type for MIDI gate output
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI output: {0}")]
    InitError(String),

    #[error("No MIDI port found matching pattern: {0}")]
    PortNotFound(String),

    #[error("Invalid MIDI port index: {0}")]
    InvalidPort(usize),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to send MIDI message: {0}")]
    SendError(String),
}
