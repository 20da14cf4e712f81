//! Drain tracking shared by the folder and document queues
//!
//! One counter covers both queues of a path. It is incremented before a job
//! is enqueued and decremented once the job has finished (or been
//! discarded), so it only reaches zero when nothing is queued and nothing is
//! running anywhere. A folder job counts its children before it counts
//! itself out, so the counter can never dip to zero while discovery is
//! still producing work.

use std::sync::Arc;
use tokio::sync::watch;

/// Count of queued plus in-flight jobs for one path
#[derive(Clone, Debug)]
pub(crate) struct PendingWork {
    count: Arc<watch::Sender<usize>>,
}

impl PendingWork {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Register `jobs` new jobs; call before they are enqueued
    pub(crate) fn add(&self, jobs: usize) {
        if jobs > 0 {
            self.count.send_modify(|count| *count += jobs);
        }
    }

    /// Mark one job finished or discarded
    pub(crate) fn complete(&self) {
        self.count
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Jobs currently queued or running
    pub(crate) fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Watch for the count reaching zero
    ///
    /// The watch is level-triggered: if the count is already zero when
    /// [`DrainWatch::drained`] is awaited, it returns at once.
    pub(crate) fn watch(&self) -> DrainWatch {
        DrainWatch {
            count: self.count.subscribe(),
        }
    }
}

/// Completion signal for a [`PendingWork`]
#[derive(Debug)]
pub(crate) struct DrainWatch {
    count: watch::Receiver<usize>,
}

impl DrainWatch {
    /// Wait until no job is queued or running
    pub(crate) async fn drained(mut self) {
        // The sender lives in the same PendingWork the caller holds, so the
        // channel cannot close while this is awaited.
        let _ = self.count.wait_for(|count| *count == 0).await;
    }
}
