//! Error types for Reelplay Core

use thiserror::Error;

use crate::player::StreamingErrorKind;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Missing required parameters: need source and id, or a title")]
    MissingParameters,

    #[error("No results found")]
    NoResultsFound,

    #[error("Source not found: {source_id}-{id}")]
    SourceNotFound { source_id: String, id: String },

    // Probe errors
    #[error("Probe failed for {source_name}: {reason}")]
    ProbeFailure { source_name: String, reason: String },

    // Player errors
    #[error("Player initialization failed: {0}")]
    PlayerInit(String),

    #[error("Streaming error ({kind}): {details}")]
    StreamingProtocol {
        kind: StreamingErrorKind,
        details: String,
    },

    #[error("Invalid episode index {index}, {total} episodes available")]
    InvalidEpisode { index: usize, total: usize },

    // State errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a probe failure for a named source
    pub fn probe(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ProbeFailure {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error ends the current session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::MissingParameters
                | Error::NoResultsFound
                | Error::PlayerInit(_)
                | Error::StreamingProtocol { .. }
        )
    }

    /// Message shown to the user for a failed session
    pub fn user_message(&self) -> String {
        match self {
            Error::MissingParameters => "Missing required parameters".to_string(),
            Error::NoResultsFound => "No results found".to_string(),
            Error::SourceNotFound { .. } => "The selected source is not available".to_string(),
            Error::PlayerInit(_) => "Failed to initialize the player".to_string(),
            Error::StreamingProtocol { .. } => "Playback failed, the stream could not be recovered".to_string(),
            Error::InvalidEpisode { index, total } => {
                format!("Invalid episode index {}, {} episodes available", index, total)
            }
            other => other.to_string(),
        }
    }

    /// Returns the error code for logs and the UI
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::MissingParameters => "MISSING_PARAMETERS",
            Error::NoResultsFound => "NO_RESULTS",
            Error::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            Error::ProbeFailure { .. } => "PROBE_FAILURE",
            Error::PlayerInit(_) => "PLAYER_INIT",
            Error::StreamingProtocol { .. } => "STREAMING_PROTOCOL",
            Error::InvalidEpisode { .. } => "INVALID_EPISODE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Error::Storage(_) => "STORAGE",
            Error::Network(_) => "NETWORK",
            Error::Api { .. } => "API",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
