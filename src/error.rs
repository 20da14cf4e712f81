//! Error types for docsweep
//!
//! Errors are split along the lines of how far they are allowed to travel:
//! - [`RemoteError`] is what a remote store client reports for a single call
//! - [`TransferError`] covers one document's pipeline and never escapes the worker pool
//! - [`Error`] is what a path or task run returns to its caller

use crate::types::TransferStage;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docsweep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for remote store client calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Main error type for docsweep
///
/// Every variant that escapes a task run carries enough context (folder,
/// path, configuration key) to diagnose the failure from the log alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "paths[0].remote")
        key: Option<String>,
    },

    /// A filter pattern could not be compiled
    #[error("invalid {field} pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Which side of the filter the pattern belongs to ("include" or "exclude")
        field: &'static str,
        /// The offending pattern
        pattern: String,
        /// Underlying glob compilation error
        source: globset::Error,
    },

    /// Connecting to the remote store failed
    #[error("failed to connect to remote store{}: {source}", .client_id.as_deref().map(|id| format!(" as {id}")).unwrap_or_default())]
    Connection {
        /// Client identifier used for the attempt, if one was configured
        client_id: Option<String>,
        /// Underlying remote error
        source: RemoteError,
    },

    /// The staging area could not be created or removed
    #[error("staging area error at {path}: {source}")]
    Staging {
        /// The staging directory (or its intended parent)
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The local root of a path could not be prepared
    #[error("cannot prepare local directory {path}: {source}")]
    LocalRoot {
        /// The local root directory
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A folder could not be resolved or its documents could not be listed
    #[error("failed to list folder {folder}: {source}")]
    FolderList {
        /// The folder reference or display path
        folder: String,
        /// Underlying remote error
        source: RemoteError,
    },

    /// The subfolders of a folder could not be listed
    #[error("failed to list subfolders of {folder}: {source}")]
    SubfolderList {
        /// The folder display path
        folder: String,
        /// Underlying remote error
        source: RemoteError,
    },

    /// Per-document transfer error
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors reported by a remote store client
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The requested folder or document does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected or the session expired
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other failed request
    #[error("request failed: {0}")]
    Request(String),

    /// I/O error while streaming content
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-document pipeline errors
///
/// These are logged and counted; the job is abandoned and the worker moves on.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The listing entry could not be resolved to a full document
    #[error("failed to resolve document {name}: {source}")]
    Resolve {
        /// Display name from the listing
        name: String,
        /// Underlying remote error
        source: RemoteError,
    },

    /// The computed local file name is unusable
    #[error("cannot derive a local file name for {name}: {reason}")]
    InvalidName {
        /// Display name of the document
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// A staging file could not be created or written
    #[error("staging file error for {uid}: {source}")]
    StagingFile {
        /// Document unique id
        uid: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Downloading the document content failed
    #[error("failed to download {uid}: {source}")]
    Download {
        /// Document unique id
        uid: String,
        /// Underlying remote error
        source: RemoteError,
    },

    /// The destination already exists and was left untouched
    #[error("destination {path} already exists")]
    DestinationExists {
        /// The existing destination file
        path: PathBuf,
    },

    /// The staged file could not be placed at its destination
    #[error("failed to commit {path}: {source}")]
    Commit {
        /// The intended destination file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Moving or deleting the remote original failed
    #[error("failed to {action} remote document {uid}: {source}")]
    Disposition {
        /// Document unique id
        uid: String,
        /// "move" or "delete"
        action: &'static str,
        /// Underlying remote error
        source: RemoteError,
    },
}

impl TransferError {
    /// The pipeline stage that failed
    pub fn stage(&self) -> TransferStage {
        match self {
            TransferError::Resolve { .. } => TransferStage::Resolve,
            TransferError::InvalidName { .. }
            | TransferError::StagingFile { .. }
            | TransferError::Download { .. } => TransferStage::Download,
            TransferError::DestinationExists { .. } | TransferError::Commit { .. } => {
                TransferStage::Commit
            }
            TransferError::Disposition { .. } => TransferStage::Disposition,
        }
    }
}
