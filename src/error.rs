//! Error types for Recon Gateway

use std::io;

use thiserror::Error;

use crate::adapter::FetchError;

/// Result type alias for Recon Gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Recon Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request (bad input, never reaches adapters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Fatal pipeline stage failure (chain fetch only)
    #[error("Fetch stage failed: {source}")]
    FatalFetch {
        /// The upstream failure that aborted the pipeline
        #[source]
        source: FetchError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the whole request might succeed (transient upstream
    /// issue) as opposed to a permanent one (bad address, bad config).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FatalFetch { source } => source.is_retryable(),
            Self::Http(_) => true,
            _ => false,
        }
    }

    /// Map to an HTTP status code for the transport layer.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::FatalFetch { source } => match source {
                FetchError::RateLimited => 503,
                FetchError::InvalidAddress(_) => 400,
                _ => 502,
            },
            Self::Config(_) | Self::Internal(_) | Self::Io(_) | Self::Json(_) => 500,
            Self::Http(_) => 502,
        }
    }
}
