//! Path orchestration: folder discovery feeding a pool of transfer workers
//!
//! Each path gets two fresh FIFO queues. Folder jobs resolve and list a
//! folder, push the selected documents onto the document queue and, when
//! recursing, push subfolders back onto the folder queue. Document jobs run
//! the transfer pipeline. Both queues are drained by their own dispatcher,
//! bounded by a semaphore sized from the task's concurrency settings, and
//! share a single [`PendingWork`] counter that decides when the path is done.
//!
//! A folder failure halts the path: queued jobs are discarded, jobs already
//! running finish, and the first fatal error is returned once everything has
//! settled. Document failures are logged and counted, never propagated.

mod folder;
mod pending;
mod transfer;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::{PathConfig, TaskConfig};
use crate::error::{Error, Result};
use crate::filter::DocumentFilter;
use crate::naming::FileNamer;
use crate::remote::RemoteSession;
use crate::staging::StagingArea;
use crate::types::{Disposition, Event, PathReport, RemoteDocumentSummary, RemoteFolderRef};
use pending::PendingWork;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counters updated by the workers of one path
#[derive(Debug, Default)]
struct PathStats {
    folders_scanned: AtomicUsize,
    documents_listed: AtomicUsize,
    documents_selected: AtomicUsize,
    transferred: AtomicUsize,
    failed: AtomicUsize,
    moved: AtomicUsize,
    deleted: AtomicUsize,
}

impl PathStats {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn report(&self, remote: &RemoteFolderRef, local: &Path) -> PathReport {
        PathReport {
            remote: remote.to_string(),
            local: local.to_path_buf(),
            folders_scanned: self.folders_scanned.load(Ordering::Relaxed),
            documents_listed: self.documents_listed.load(Ordering::Relaxed),
            documents_selected: self.documents_selected.load(Ordering::Relaxed),
            transferred: self.transferred.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            moved: self.moved.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every folder and document job of one path
pub(crate) struct PathContext {
    session: Arc<dyn RemoteSession>,
    staging: Arc<StagingArea>,
    filter: DocumentFilter,
    namer: FileNamer,
    local_root: PathBuf,
    recurse: bool,
    disposition: Disposition,
    event_tx: broadcast::Sender<Event>,
    folder_tx: mpsc::UnboundedSender<RemoteFolderRef>,
    document_tx: mpsc::UnboundedSender<RemoteDocumentSummary>,
    pending: PendingWork,
    halted: AtomicBool,
    fatal: Mutex<Option<Error>>,
    stats: PathStats,
}

impl PathContext {
    fn emit(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Folder the originals are moved into, if any
    fn wastebin(&self) -> Option<&RemoteFolderRef> {
        match &self.disposition {
            Disposition::Move { wastebin } => Some(wastebin),
            Disposition::Delete => None,
        }
    }

    fn enqueue_folders(&self, folders: Vec<RemoteFolderRef>) {
        self.pending.add(folders.len());
        for folder in folders {
            if self.folder_tx.send(folder).is_err() {
                self.pending.complete();
            }
        }
    }

    fn enqueue_documents(&self, documents: Vec<RemoteDocumentSummary>) {
        self.pending.add(documents.len());
        for document in documents {
            if self.document_tx.send(document).is_err() {
                self.pending.complete();
            }
        }
    }

    /// Stop the path; the first error wins
    async fn halt(&self, error: Error) {
        let mut fatal = self.fatal.lock().await;
        if fatal.is_none() {
            *fatal = Some(error);
        } else {
            debug!(error = %error, "path already halted, dropping additional error");
        }
        self.halted.store(true, Ordering::SeqCst);
    }
}

/// Counts a job out when dropped, even if the job panicked
struct CompleteOnDrop(PendingWork);

impl Drop for CompleteOnDrop {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Consume one queue, running each job on its own task under `limit` permits
fn spawn_dispatcher<T, F, Fut>(
    ctx: Arc<PathContext>,
    mut queue: mpsc::UnboundedReceiver<T>,
    limit: usize,
    job: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(Arc<PathContext>, T) -> Fut + Copy + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));

    tokio::spawn(async move {
        while let Some(item) = queue.recv().await {
            if ctx.is_halted() {
                ctx.pending.complete();
                continue;
            }

            // Acquire a permit from the semaphore (blocks while the pool is full)
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    ctx.pending.complete();
                    continue;
                }
            };

            // The path may have halted while this job waited for a slot
            if ctx.is_halted() {
                drop(permit);
                ctx.pending.complete();
                continue;
            }

            let done = CompleteOnDrop(ctx.pending.clone());
            let job_ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let _done = done;
                let _permit = permit;
                job(job_ctx, item).await;
            });
        }
    })
}

/// Resolve how transferred originals are disposed of for this run
///
/// A wastebin that resolves to the same folder as the root (for example an
/// alias of it) would move documents onto themselves, so it falls back to
/// delete just like a wastebin configured equal to the root. A wastebin that
/// cannot be resolved keeps the move; each document then fails at its
/// disposition step and its original stays in place.
async fn resolve_disposition(session: &dyn RemoteSession, path: &PathConfig) -> Disposition {
    let disposition = path.disposition();
    match &disposition {
        Disposition::Move { wastebin } => {
            let bin = match session.get_folder(wastebin).await {
                Ok(bin) => bin,
                Err(e) => {
                    warn!(
                        remote = %path.remote,
                        wastebin = %wastebin,
                        error = %e,
                        "wastebin cannot be resolved, moves will fail per document"
                    );
                    return disposition;
                }
            };
            // An unresolvable root is reported by the root folder job.
            let Ok(root) = session.get_folder(&path.remote).await else {
                return disposition;
            };
            if bin.path == root.path {
                warn!(
                    remote = %path.remote,
                    wastebin = %wastebin,
                    "wastebin resolves to the remote root, transferred documents will be deleted"
                );
                return Disposition::Delete;
            }
        }
        Disposition::Delete if path.wastebin.is_some() => {
            warn!(
                remote = %path.remote,
                "wastebin equals the remote root, transferred documents will be deleted"
            );
        }
        Disposition::Delete => {}
    }
    disposition
}

/// Process one path to completion
///
/// # Arguments
///
/// * `session` - The task's shared remote session
/// * `staging` - The task's staging area
/// * `task` - Task-level settings (naming, extension, concurrency)
/// * `path` - The path to process
/// * `event_tx` - Where progress events are sent
///
/// # Returns
///
/// The path's counters once both queues have drained, or the first fatal
/// error (local root, folder or subfolder listing failure).
pub async fn run_path(
    session: Arc<dyn RemoteSession>,
    staging: Arc<StagingArea>,
    task: &TaskConfig,
    path: &PathConfig,
    event_tx: broadcast::Sender<Event>,
) -> Result<PathReport> {
    info!(
        remote = %path.remote,
        local = %path.local.display(),
        recurse = path.recurse,
        "processing path"
    );
    event_tx
        .send(Event::PathStarted {
            remote: path.remote.to_string(),
            local: path.local.clone(),
        })
        .ok();

    let result = drive_path(session, staging, task, path, event_tx.clone()).await;

    match &result {
        Ok(report) => {
            info!(
                remote = %path.remote,
                folders = report.folders_scanned,
                selected = report.documents_selected,
                transferred = report.transferred,
                failed = report.failed,
                "path complete"
            );
            event_tx
                .send(Event::PathComplete {
                    report: report.clone(),
                })
                .ok();
        }
        Err(e) => {
            error!(remote = %path.remote, error = %e, "path aborted");
            event_tx
                .send(Event::PathFailed {
                    remote: path.remote.to_string(),
                    error: e.to_string(),
                })
                .ok();
        }
    }
    result
}

async fn drive_path(
    session: Arc<dyn RemoteSession>,
    staging: Arc<StagingArea>,
    task: &TaskConfig,
    path: &PathConfig,
    event_tx: broadcast::Sender<Event>,
) -> Result<PathReport> {
    let filter = DocumentFilter::new(&path.filter)?;
    let namer = FileNamer::new(path.name_format(task), &task.file_extension);

    tokio::fs::create_dir_all(&path.local)
        .await
        .map_err(|source| Error::LocalRoot {
            path: path.local.clone(),
            source,
        })?;

    let disposition = resolve_disposition(session.as_ref(), path).await;
    debug!(remote = %path.remote, disposition = disposition.action(), "disposition selected");

    let (folder_tx, folder_rx) = mpsc::unbounded_channel();
    let (document_tx, document_rx) = mpsc::unbounded_channel();

    let ctx = Arc::new(PathContext {
        session,
        staging,
        filter,
        namer,
        local_root: path.local.clone(),
        recurse: path.recurse,
        disposition,
        event_tx,
        folder_tx,
        document_tx,
        pending: PendingWork::new(),
        halted: AtomicBool::new(false),
        fatal: Mutex::new(None),
        stats: PathStats::default(),
    });

    // Watch before seeding so the drain signal covers the root job itself.
    let drained = ctx.pending.watch();
    let dispatchers = [
        spawn_dispatcher(
            Arc::clone(&ctx),
            folder_rx,
            task.concurrency.folders,
            folder::run_folder_job,
        ),
        spawn_dispatcher(
            Arc::clone(&ctx),
            document_rx,
            task.concurrency.documents,
            transfer::run_transfer_job,
        ),
    ];

    ctx.enqueue_folders(vec![path.remote.clone()]);
    drained.drained().await;

    // Both queues are empty and idle; the dispatchers only wait on recv().
    for dispatcher in dispatchers {
        dispatcher.abort();
        let _ = dispatcher.await;
    }

    let report = ctx.stats.report(&path.remote, &path.local);
    let fatal = ctx.fatal.lock().await.take();
    match fatal {
        Some(error) => Err(error),
        None => Ok(report),
    }
}
