//! Core types for docsweep

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque reference to a remote folder
///
/// Usually a folder path such as `/Admin/Imports`. Trailing slashes are
/// dropped so that `/R` and `/R/` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RemoteFolderRef(String);

impl RemoteFolderRef {
    /// Create a new folder reference
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let trimmed = reference.trim_end_matches('/');
        if trimmed.is_empty() && reference.starts_with('/') {
            Self("/".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Get the reference as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RemoteFolderRef {
    fn from(reference: String) -> Self {
        Self::new(reference)
    }
}

impl From<&str> for RemoteFolderRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

impl From<RemoteFolderRef> for String {
    fn from(reference: RemoteFolderRef) -> Self {
        reference.0
    }
}

impl std::fmt::Display for RemoteFolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved remote folder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFolder {
    /// Reference the folder was resolved from
    pub reference: RemoteFolderRef,
    /// Display path, used for logging and wastebin comparison
    pub path: String,
}

/// Lightweight listing entry for a document
///
/// Not enough to download: it must be resolved to a [`RemoteDocument`] first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDocumentSummary {
    /// Display name, the only thing filters look at
    pub name: String,
    /// Opaque handle the store uses to resolve the full document
    pub href: String,
}

/// A fully resolved remote document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDocument {
    /// Display name
    pub name: String,
    /// Full remote path
    pub path: String,
    /// Unique identifier assigned by the store
    pub uid: String,
}

/// What happens to a remote original after its local copy is committed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Move the document into the wastebin folder
    Move {
        /// Destination folder
        wastebin: RemoteFolderRef,
    },
    /// Delete the document permanently
    Delete,
}

impl Disposition {
    /// Short verb used in logs and errors
    pub fn action(&self) -> &'static str {
        match self {
            Disposition::Move { .. } => "move",
            Disposition::Delete => "delete",
        }
    }
}

/// Stage of the per-document pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    /// Resolving the listing entry to a full document
    Resolve,
    /// Downloading into the staging area
    Download,
    /// Placing the staged file at its destination
    Commit,
    /// Moving or deleting the remote original
    Disposition,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransferStage::Resolve => "resolve",
            TransferStage::Download => "download",
            TransferStage::Commit => "commit",
            TransferStage::Disposition => "disposition",
        };
        f.write_str(name)
    }
}

/// Events emitted while a task runs
///
/// Subscribe with [`TaskRunner::subscribe`](crate::TaskRunner::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task connected and is about to process its paths
    TaskStarted {
        /// Number of configured paths
        paths: usize,
    },

    /// A path started processing
    PathStarted {
        /// Remote root
        remote: String,
        /// Local root
        local: PathBuf,
    },

    /// A folder was listed
    FolderScanned {
        /// Folder display path
        folder: String,
        /// Documents found in the folder
        documents: usize,
        /// Documents selected by the filter
        selected: usize,
    },

    /// A document was committed locally and disposed of remotely
    DocumentTransferred {
        /// Display name
        name: String,
        /// Unique id
        uid: String,
        /// Where the local copy was written
        destination: PathBuf,
        /// "move" or "delete"
        disposition: String,
    },

    /// A document job was abandoned
    DocumentFailed {
        /// Display name
        name: String,
        /// Stage that failed
        stage: TransferStage,
        /// Error message
        error: String,
    },

    /// A path drained without a fatal error
    PathComplete {
        /// Final counters for the path
        report: PathReport,
    },

    /// A path was aborted
    PathFailed {
        /// Remote root
        remote: String,
        /// Error message
        error: String,
    },

    /// All paths of a task completed
    TaskComplete {
        /// Number of documents transferred across all paths
        transferred: usize,
        /// Number of documents abandoned across all paths
        failed: usize,
    },

    /// The task stopped with an error
    TaskFailed {
        /// Error message
        error: String,
    },
}

/// Counters for one processed path
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathReport {
    /// Remote root
    pub remote: String,
    /// Local root
    pub local: PathBuf,
    /// Folders resolved and listed
    pub folders_scanned: usize,
    /// Documents returned by listings
    pub documents_listed: usize,
    /// Documents that passed the filter and were queued
    pub documents_selected: usize,
    /// Documents committed locally and disposed of remotely
    pub transferred: usize,
    /// Documents abandoned at any stage
    pub failed: usize,
    /// Remote originals moved to the wastebin
    pub moved: usize,
    /// Remote originals deleted
    pub deleted: usize,
}

/// Outcome of a successful task run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskReport {
    /// When the task started
    pub started_at: DateTime<Utc>,
    /// When the task finished
    pub finished_at: DateTime<Utc>,
    /// One report per processed path, in configuration order
    pub paths: Vec<PathReport>,
}

impl TaskReport {
    /// Documents transferred across all paths
    pub fn transferred(&self) -> usize {
        self.paths.iter().map(|p| p.transferred).sum()
    }

    /// Documents abandoned across all paths
    pub fn failed(&self) -> usize {
        self.paths.iter().map(|p| p.failed).sum()
    }
}
