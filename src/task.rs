//! Task execution
//!
//! A task opens one remote session and one staging area, processes its
//! paths strictly in order, and always releases both on the way out. The
//! first path that fails aborts the task; later paths are not started.

use crate::config::{Config, TaskConfig};
use crate::error::{Error, Result};
use crate::remote::RemoteStore;
use crate::staging::StagingArea;
use crate::types::{Event, TaskReport};
use crate::walker::run_path;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Capacity of the event channel; slow subscribers lag rather than block
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Runs migration tasks against a remote store
///
/// # Examples
///
/// ```
/// use docsweep::{PathConfig, TaskConfig, TaskRunner};
/// use docsweep::remote::memory::MemoryStore;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// store.add_document("/Inbox", "scan.pdf", b"%PDF-1.7").await;
///
/// let out = tempfile::tempdir()?;
/// let task = TaskConfig {
///     paths: vec![PathConfig::new("/Inbox", out.path())],
///     ..TaskConfig::default()
/// };
///
/// let runner = TaskRunner::new(Arc::new(store.clone()));
/// let report = runner.run_task(&task).await?;
/// assert_eq!(report.transferred(), 1);
/// assert_eq!(store.document_count().await, 0);
/// # Ok(())
/// # }
/// ```
pub struct TaskRunner {
    store: Arc<dyn RemoteStore>,
    event_tx: broadcast::Sender<Event>,
}

impl TaskRunner {
    /// Create a runner for the given store
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { store, event_tx }
    }

    /// Subscribe to progress events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Run every task of a configuration in order
    ///
    /// Stops at the first task that fails and returns its error; the reports
    /// of tasks that already completed are logged but not returned.
    pub async fn run_all(&self, config: &Config) -> Result<Vec<TaskReport>> {
        config.validate()?;

        let mut reports = Vec::with_capacity(config.tasks.len());
        for (index, task) in config.tasks.iter().enumerate() {
            info!(task = index, paths = task.paths.len(), "executing task");
            reports.push(self.run_task(task).await?);
        }
        Ok(reports)
    }

    /// Run one task
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] or [`Error::InvalidPattern`] before anything is contacted
    /// - [`Error::Connection`] when the store rejects the session
    /// - [`Error::Staging`] when the staging area cannot be created, or cannot
    ///   be removed after an otherwise successful run
    /// - the first fatal path error ([`Error::LocalRoot`], [`Error::FolderList`],
    ///   [`Error::SubfolderList`])
    pub async fn run_task(&self, task: &TaskConfig) -> Result<TaskReport> {
        let result = self.execute(task).await;
        match &result {
            Ok(report) => {
                info!(
                    paths = report.paths.len(),
                    transferred = report.transferred(),
                    failed = report.failed(),
                    "task complete"
                );
                self.emit(Event::TaskComplete {
                    transferred: report.transferred(),
                    failed: report.failed(),
                });
            }
            Err(e) => {
                error!(error = %e, "task failed");
                self.emit(Event::TaskFailed {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn execute(&self, task: &TaskConfig) -> Result<TaskReport> {
        let started_at = Utc::now();
        task.validate()?;

        let client_id = task.auth.client_id();
        info!(
            client_id = client_id.unwrap_or("<none>"),
            "connecting to remote store"
        );
        let session = self
            .store
            .connect(&task.auth)
            .await
            .map_err(|source| Error::Connection {
                client_id: client_id.map(str::to_string),
                source,
            })?;

        let staging = match StagingArea::create(task.staging_dir.as_deref()) {
            Ok(staging) => Arc::new(staging),
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        self.emit(Event::TaskStarted {
            paths: task.paths.len(),
        });

        let mut reports = Vec::with_capacity(task.paths.len());
        let mut outcome = Ok(());
        for (index, path) in task.paths.iter().enumerate() {
            match run_path(
                Arc::clone(&session),
                Arc::clone(&staging),
                task,
                path,
                self.event_tx.clone(),
            )
            .await
            {
                Ok(report) => reports.push(report),
                Err(e) => {
                    let skipped = task.paths.len() - index - 1;
                    if skipped > 0 {
                        warn!(skipped, "skipping remaining paths of the task");
                    }
                    outcome = Err(e);
                    break;
                }
            }
        }

        let cleanup = close_staging(staging).await;
        info!("disconnecting from remote store");
        session.close().await;

        outcome?;
        cleanup?;

        Ok(TaskReport {
            started_at,
            finished_at: Utc::now(),
            paths: reports,
        })
    }
}

/// Remove the staging area once no path holds it any more
async fn close_staging(staging: Arc<StagingArea>) -> Result<()> {
    match Arc::try_unwrap(staging) {
        Ok(staging) => staging.close().await.inspect_err(|e| {
            warn!(error = %e, "failed to remove staging area");
        }),
        Err(shared) => {
            // Dropping the last handle removes it anyway.
            warn!(
                path = %shared.path().display(),
                "staging area still in use, removal deferred"
            );
            Ok(())
        }
    }
}

/// Run one task with a fresh [`TaskRunner`]
pub async fn run_task(store: Arc<dyn RemoteStore>, task: &TaskConfig) -> Result<TaskReport> {
    TaskRunner::new(store).run_task(task).await
}
