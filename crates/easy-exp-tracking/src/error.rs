//! Error types for easy-exp-tracking

use thiserror::Error;

/// Errors that can occur while talking to a tracking backend
#[derive(Error, Debug)]
pub enum TrackingError {
    /// The referenced run does not exist
    #[error("Run not found: {run}")]
    RunNotFound { run: String },

    /// The run is not in the state the operation requires
    #[error("Run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    /// No artifact with this name was uploaded to the run
    #[error("Artifact not found: {name} (run {run})")]
    ArtifactNotFound { run: String, name: String },

    /// Artifact names must be relative paths without `..` components
    #[error("Invalid artifact name: {0}")]
    InvalidArtifactName(String),

    /// Account, project and run id must each be a single plain path segment
    #[error("Invalid {kind}: {value:?}")]
    InvalidRunSegment { kind: &'static str, value: String },

    /// A history line could not be parsed
    #[error("Corrupt history at {path}:{line}: {message}")]
    CorruptHistory {
        path: String,
        line: usize,
        message: String,
    },

    /// The backend could not be reached
    #[error("Tracking backend unavailable: {0}")]
    Unavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
