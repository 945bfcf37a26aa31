//! Error types for the chapter streaming engine.

use crate::chapter::ChapterKey;
use std::time::Duration;
use thiserror::Error;

/// Why a single content request failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    /// The content source could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The content source has no such chapter.
    #[error("chapter not found")]
    NotFound,

    /// The content source refused the request (unauthorized or not owned).
    #[error("request rejected with status {status}")]
    Rejected { status: u16 },

    /// Any other non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16 },

    /// The payload did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// No response arrived within the configured fetch timeout.
    #[error("no response after {}s", after.as_secs_f32())]
    Timeout { after: Duration },
}

impl FetchError {
    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401..=403 => Self::Rejected { status },
            _ => Self::Status { status },
        }
    }

    /// Returns a short message suitable for display in the reading view.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => {
                "Could not reach the library. Check your connection and try again."
            }
            Self::NotFound => "This chapter does not exist.",
            Self::Rejected { .. } => "This chapter is locked.",
            Self::Status { .. } | Self::Decode(_) => "Something went wrong loading this chapter.",
        }
    }
}

/// Typed failure for one chapter fetch, carrying the requested key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to fetch chapter {key}: {cause}")]
pub struct FetchFailure {
    pub key: ChapterKey,
    #[source]
    pub cause: FetchError,
}

impl FetchFailure {
    pub fn new(key: ChapterKey, cause: FetchError) -> Self {
        Self { key, cause }
    }
}

/// Heartbeat delivery failures. Always logged, never surfaced.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("heartbeat transport error: {0}")]
    Transport(String),

    #[error("heartbeat rejected with status {status}")]
    Status { status: u16 },
}

/// Failures talking to the session controller task.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The controller task has stopped; the session was closed.
    #[error("reading session is closed")]
    Closed,
}
