//! Error types for the gateway core

use thiserror::Error;

/// Session store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session store is no longer running")]
    Closed,
}

/// Document repository and upload storage errors
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Document backend error: {0}")]
    Backend(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl From<anyhow::Error> for DocumentError {
    fn from(error: anyhow::Error) -> Self {
        DocumentError::Backend(error.to_string())
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(error: serde_json::Error) -> Self {
        DocumentError::Backend(error.to_string())
    }
}

/// Upstream generation backend errors. These never reach the client: the
/// token source turns them into a degradation reason.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Ingestion notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("ingest request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ingest returned status {0}")]
    Status(u16),
}

/// Errors that reject a streaming request before any token is produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("content required")]
    BlankContent,

    #[error("session store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RelayError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => RelayError::SessionNotFound(id),
            other => RelayError::Store(other),
        }
    }
}

/// Result type alias for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;
