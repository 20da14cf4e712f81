//! In-memory remote store
//!
//! Holds a folder tree and document contents in process memory. Any call can
//! be made to fail on demand with [`MemoryStore::fail`], which is how the
//! per-document and per-path error paths are exercised without a live store.

use super::{Credentials, RemoteSession, RemoteStore};
use crate::error::{RemoteError, RemoteResult};
use crate::types::{RemoteDocument, RemoteDocumentSummary, RemoteFolder, RemoteFolderRef};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// A call the store should fail
///
/// Folder failures are keyed by folder path, document failures by display name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Failure {
    /// Reject every connection attempt
    Connect,
    /// Fail resolving this folder
    GetFolder(String),
    /// Fail listing documents of this folder
    ListDocuments(String),
    /// Fail listing subfolders of this folder
    ListSubfolders(String),
    /// Fail resolving this document
    Resolve(String),
    /// Write half of this document, then fail
    Download(String),
    /// Fail moving this document
    Move(String),
    /// Fail deleting this document
    Delete(String),
}

#[derive(Debug)]
struct StoredDocument {
    name: String,
    folder: String,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    folders: BTreeSet<String>,
    documents: BTreeMap<String, StoredDocument>,
    failures: HashSet<Failure>,
    next_uid: u64,
    latency: Option<Duration>,
    connects: usize,
    closes: usize,
    downloads_in_flight: usize,
    peak_downloads: usize,
}

impl MemoryState {
    fn check(&self, failure: Failure) -> RemoteResult<()> {
        if self.failures.contains(&failure) {
            Err(RemoteError::Request(format!("injected failure: {failure:?}")))
        } else {
            Ok(())
        }
    }

    fn insert_folder(&mut self, path: &str) {
        let mut current = RemoteFolderRef::new(path).as_str().to_string();
        loop {
            let parent = parent_of(&current);
            self.folders.insert(current);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }
}

fn parent_of(path: &str) -> Option<String> {
    match path.rsplit_once('/') {
        Some(("", rest)) if !rest.is_empty() => Some("/".to_string()),
        Some((parent, _)) if !parent.is_empty() => Some(parent.to_string()),
        _ => None,
    }
}

fn join(folder: &str, name: &str) -> String {
    if folder.ends_with('/') {
        format!("{folder}{name}")
    } else {
        format!("{folder}/{name}")
    }
}

/// In-memory [`RemoteStore`]
///
/// Cloning shares the underlying tree.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder and all of its ancestors
    pub async fn add_folder(&self, path: &str) {
        self.state.lock().await.insert_folder(path);
    }

    /// Add a document with a generated unique id, returning the id
    pub async fn add_document(&self, folder: &str, name: &str, content: &[u8]) -> String {
        let mut state = self.state.lock().await;
        state.next_uid += 1;
        let uid = format!("DOC-{:04}", state.next_uid);
        Self::insert_document(&mut state, folder, name, &uid, content);
        uid
    }

    /// Add a document with a caller-chosen unique id
    pub async fn add_document_with_uid(&self, folder: &str, name: &str, uid: &str, content: &[u8]) {
        let mut state = self.state.lock().await;
        Self::insert_document(&mut state, folder, name, uid, content);
    }

    fn insert_document(state: &mut MemoryState, folder: &str, name: &str, uid: &str, content: &[u8]) {
        state.insert_folder(folder);
        state.documents.insert(
            uid.to_string(),
            StoredDocument {
                name: name.to_string(),
                folder: RemoteFolderRef::new(folder).as_str().to_string(),
                content: content.to_vec(),
            },
        );
    }

    /// Make a call fail from now on
    pub async fn fail(&self, failure: Failure) {
        self.state.lock().await.failures.insert(failure);
    }

    /// Remove all injected failures
    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Delay every session call by `latency`, and hold each download open
    /// for as long again
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = Some(latency);
    }

    /// Names of the documents currently in a folder, in id order
    pub async fn documents_in(&self, folder: &str) -> Vec<String> {
        let folder = RemoteFolderRef::new(folder);
        self.state
            .lock()
            .await
            .documents
            .values()
            .filter(|doc| doc.folder == folder.as_str())
            .map(|doc| doc.name.clone())
            .collect()
    }

    /// Whether a document with this id still exists anywhere
    pub async fn contains(&self, uid: &str) -> bool {
        self.state.lock().await.documents.contains_key(uid)
    }

    /// Total number of documents in the store
    pub async fn document_count(&self) -> usize {
        self.state.lock().await.documents.len()
    }

    /// Number of sessions opened so far
    pub async fn connect_count(&self) -> usize {
        self.state.lock().await.connects
    }

    /// Number of sessions closed so far
    pub async fn close_count(&self) -> usize {
        self.state.lock().await.closes
    }

    /// Highest number of downloads observed running at the same time
    pub async fn peak_concurrent_downloads(&self) -> usize {
        self.state.lock().await.peak_downloads
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn connect(&self, credentials: &Credentials) -> RemoteResult<Arc<dyn RemoteSession>> {
        let mut state = self.state.lock().await;
        if state.failures.contains(&Failure::Connect) {
            return Err(RemoteError::Auth(format!(
                "credentials rejected for client {}",
                credentials.client_id().unwrap_or("<none>")
            )));
        }
        state.connects += 1;
        Ok(Arc::new(MemorySession {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session handed out by [`MemoryStore`]
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    closed: AtomicBool,
}

impl MemorySession {
    async fn pause(&self) -> RemoteResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Auth("session closed".to_string()));
        }
        let latency = self.state.lock().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn get_folder(&self, folder: &RemoteFolderRef) -> RemoteResult<RemoteFolder> {
        self.pause().await?;
        let state = self.state.lock().await;
        state.check(Failure::GetFolder(folder.as_str().to_string()))?;
        if !state.folders.contains(folder.as_str()) {
            return Err(RemoteError::NotFound(folder.to_string()));
        }
        Ok(RemoteFolder {
            reference: folder.clone(),
            path: folder.as_str().to_string(),
        })
    }

    async fn get_documents(
        &self,
        folder: &RemoteFolderRef,
    ) -> RemoteResult<Vec<RemoteDocumentSummary>> {
        self.pause().await?;
        let state = self.state.lock().await;
        state.check(Failure::ListDocuments(folder.as_str().to_string()))?;
        if !state.folders.contains(folder.as_str()) {
            return Err(RemoteError::NotFound(folder.to_string()));
        }
        Ok(state
            .documents
            .iter()
            .filter(|(_, doc)| doc.folder == folder.as_str())
            .map(|(uid, doc)| RemoteDocumentSummary {
                name: doc.name.clone(),
                href: uid.clone(),
            })
            .collect())
    }

    async fn get_subfolders(&self, folder: &RemoteFolder) -> RemoteResult<Vec<RemoteFolderRef>> {
        self.pause().await?;
        let state = self.state.lock().await;
        state.check(Failure::ListSubfolders(folder.path.clone()))?;
        Ok(state
            .folders
            .iter()
            .filter(|candidate| parent_of(candidate).as_deref() == Some(folder.path.as_str()))
            .map(|path| RemoteFolderRef::new(path.as_str()))
            .collect())
    }

    async fn get_document(&self, summary: &RemoteDocumentSummary) -> RemoteResult<RemoteDocument> {
        self.pause().await?;
        let state = self.state.lock().await;
        state.check(Failure::Resolve(summary.name.clone()))?;
        let doc = state
            .documents
            .get(&summary.href)
            .ok_or_else(|| RemoteError::NotFound(summary.name.clone()))?;
        Ok(RemoteDocument {
            name: doc.name.clone(),
            path: join(&doc.folder, &doc.name),
            uid: summary.href.clone(),
        })
    }

    async fn download_document(
        &self,
        document: &RemoteDocument,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> RemoteResult<()> {
        self.pause().await?;
        let (content, fail, latency) = {
            let mut state = self.state.lock().await;
            let fail = state
                .failures
                .contains(&Failure::Download(document.name.clone()));
            let content = state
                .documents
                .get(&document.uid)
                .map(|doc| doc.content.clone())
                .ok_or_else(|| RemoteError::NotFound(document.uid.clone()))?;
            state.downloads_in_flight += 1;
            state.peak_downloads = state.peak_downloads.max(state.downloads_in_flight);
            (content, fail, state.latency)
        };

        let result = async {
            if fail {
                sink.write_all(&content[..content.len() / 2]).await?;
                return Err(RemoteError::Request(format!(
                    "connection reset while downloading {}",
                    document.uid
                )));
            }
            sink.write_all(&content).await?;
            // Stay in flight for a while so concurrent downloads overlap.
            match latency {
                Some(latency) => tokio::time::sleep(latency).await,
                None => tokio::task::yield_now().await,
            }
            Ok(())
        }
        .await;

        self.state.lock().await.downloads_in_flight -= 1;
        result
    }

    async fn move_document(
        &self,
        document: &RemoteDocument,
        destination: &RemoteFolderRef,
    ) -> RemoteResult<()> {
        self.pause().await?;
        let mut state = self.state.lock().await;
        state.check(Failure::Move(document.name.clone()))?;
        if !state.folders.contains(destination.as_str()) {
            return Err(RemoteError::NotFound(destination.to_string()));
        }
        let doc = state
            .documents
            .get_mut(&document.uid)
            .ok_or_else(|| RemoteError::NotFound(document.uid.clone()))?;
        doc.folder = destination.as_str().to_string();
        Ok(())
    }

    async fn delete_document(&self, document: &RemoteDocument) -> RemoteResult<()> {
        self.pause().await?;
        let mut state = self.state.lock().await;
        state.check(Failure::Delete(document.name.clone()))?;
        state
            .documents
            .remove(&document.uid)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(document.uid.clone()))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.lock().await.closes += 1;
        }
    }
}
