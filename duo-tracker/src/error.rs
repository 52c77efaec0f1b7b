//! Error types for duo-tracker
//!
//! Errors are split by how the sync loop reacts to them:
//! - [`FeedError`]: transient, isolated to one tracked player
//! - [`IngestError`]: payload errors reject one payload, database errors
//!   abort and roll back the in-flight batch
//! - [`SyncError`]: everything that aborts a sync cycle

use thiserror::Error;

/// Failure fetching a player's recent matches from the upstream feed
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network or transport failure
    #[error("Feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Feed answered with a non-success status
    #[error("Feed returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Response body was not a list of payloads
    #[error("Failed to decode feed response: {0}")]
    Decode(String),
}

/// Failure normalizing or storing one raw match payload
#[derive(Debug, Error)]
pub enum IngestError {
    /// Payload structure could not be decoded
    #[error("Malformed match payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// A required structural field is absent
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    /// Battle time is not in the feed's timestamp format
    #[error("Invalid battle time {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Persistence failure; the caller must roll back its batch
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// True when only the offending payload is rejected and the batch may continue
    pub fn is_payload_error(&self) -> bool {
        !matches!(self, IngestError::Database(_))
    }
}

/// Failure that aborts a sync cycle or a recompute command
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ingest failed: {0}")]
    Ingest(#[from] IngestError),

    /// Stored row could not be decoded back into a domain value
    #[error("Corrupt stored data: {0}")]
    CorruptData(String),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
