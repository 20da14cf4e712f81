//! Remote store client abstraction
//!
//! docsweep does not talk to any particular document store. It drives a
//! [`RemoteStore`] to open a [`RemoteSession`], and every listing, download,
//! move and delete goes through that session. One session is shared by all
//! workers of a task, so implementations must tolerate concurrent calls.
//!
//! [`memory::MemoryStore`] is an in-process implementation, useful for dry
//! runs and tests.

pub mod memory;

use crate::error::RemoteResult;
use crate::types::{RemoteDocument, RemoteDocumentSummary, RemoteFolder, RemoteFolderRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Opaque credentials passed straight to [`RemoteStore::connect`]
///
/// Only `clientId` is ever read by docsweep itself, for logging.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

impl Credentials {
    /// Client identifier, if the credentials carry one
    pub fn client_id(&self) -> Option<&str> {
        self.0.get("clientId").and_then(serde_json::Value::as_str)
    }
}

// Secrets stay out of logs; only the client id is shown.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id())
            .finish_non_exhaustive()
    }
}

/// Entry point to a remote document store
///
/// # Examples
///
/// ```
/// use docsweep::remote::{Credentials, RemoteStore};
/// use docsweep::remote::memory::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.add_folder("/R").await;
///
/// let session = store.connect(&Credentials::default()).await?;
/// let root = session.get_folder(&"/R".into()).await?;
/// assert_eq!(root.path, "/R");
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Authenticate and open a session
    async fn connect(&self, credentials: &Credentials) -> RemoteResult<Arc<dyn RemoteSession>>;
}

/// An authenticated session with the remote store
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Resolve a folder reference to a full folder
    async fn get_folder(&self, folder: &RemoteFolderRef) -> RemoteResult<RemoteFolder>;

    /// List the documents directly inside a folder
    async fn get_documents(
        &self,
        folder: &RemoteFolderRef,
    ) -> RemoteResult<Vec<RemoteDocumentSummary>>;

    /// List the direct subfolders of a folder
    async fn get_subfolders(&self, folder: &RemoteFolder) -> RemoteResult<Vec<RemoteFolderRef>>;

    /// Resolve a listing entry to a full document
    async fn get_document(&self, summary: &RemoteDocumentSummary) -> RemoteResult<RemoteDocument>;

    /// Stream a document's content into `sink`
    async fn download_document(
        &self,
        document: &RemoteDocument,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> RemoteResult<()>;

    /// Move a document into another folder
    async fn move_document(
        &self,
        document: &RemoteDocument,
        destination: &RemoteFolderRef,
    ) -> RemoteResult<()>;

    /// Delete a document permanently
    async fn delete_document(&self, document: &RemoteDocument) -> RemoteResult<()>;

    /// End the session
    async fn close(&self);
}
