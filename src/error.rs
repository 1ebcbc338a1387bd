//! Error taxonomy for the ingestion pipeline.
//!
//! Transport failures are classified at the fetch layer (retryable or not),
//! everything above maps into [`IngestError`]. Per-record parse problems are
//! never errors: parsers log and skip, only an unreadable root document
//! surfaces as [`IngestError::Parse`].

use thiserror::Error;

use crate::store::StoreError;

/// Failure classes produced by the resilient fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request exceeded its deadline. Retryable.
    #[error("request timed out")]
    Timeout,

    /// DNS/connect/other network-level failure. Retryable.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// A 4xx response. Not retryable; carries a short body excerpt as
    /// diagnostic when the server provided one.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// All retry attempts were spent on transient failures.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetchError::HttpStatus { .. } | FetchError::RetriesExhausted { .. }
        )
    }
}

/// Top-level error for ingestion runs and the services beneath them.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Transport(#[from] FetchError),

    /// The panel rejected the credentials (distinct from not reaching it).
    #[error("invalid credentials: {0}")]
    Auth(String),

    /// The root document could not be decoded (EPG XML, Xtream JSON).
    #[error("failed to parse {context}: {message}")]
    Parse {
        context: &'static str,
        message: String,
    },

    #[error("store operation failed: {0}")]
    Persistence(#[from] StoreError),

    /// Required configuration was missing before the run started.
    #[error("invalid playlist configuration: {0}")]
    Validation(String),

    /// The run was stopped via its cancellation token. The batch in flight
    /// at the time was committed before stopping.
    #[error("ingestion cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn parse(context: &'static str, message: impl Into<String>) -> Self {
        IngestError::Parse {
            context,
            message: message.into(),
        }
    }
}
