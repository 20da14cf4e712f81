//! # docsweep
//!
//! Bulk migration of documents out of a remote document store.
//!
//! ## Design Philosophy
//!
//! docsweep is designed to be:
//! - **Store-agnostic** - The remote store is a pair of traits; bring your own client
//! - **Safe by default** - Local files are never overwritten and appear only when complete
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## How a task runs
//!
//! A task connects once, creates a private staging directory, then processes
//! its paths in order. For each path the remote root is walked (optionally
//! recursively), every listed document is run through the path's name
//! filter, and the selected documents are downloaded into the staging area,
//! committed into the local directory, and finally moved to a wastebin
//! folder or deleted on the remote side.
//!
//! A failing document is logged and skipped. A failing folder listing
//! aborts the path and the rest of the task.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsweep::{Config, TaskRunner};
//! use docsweep::remote::memory::MemoryStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("docsweep.json")).await?;
//!
//!     // Any RemoteStore implementation goes here
//!     let runner = TaskRunner::new(Arc::new(MemoryStore::new()));
//!
//!     // Subscribe to events
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     for report in runner.run_all(&config).await? {
//!         println!("transferred {} document(s)", report.transferred());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Document name filtering
pub mod filter;
/// Local file naming
pub mod naming;
/// Remote store abstraction
pub mod remote;
/// Staging area and exclusive commit
pub mod staging;
/// Task execution
pub mod task;
/// Core types and events
pub mod types;
/// Path orchestration, folder walking and transfer workers
pub mod walker;

// Re-export commonly used types
pub use config::{ConcurrencyConfig, Config, FilterSpec, PathConfig, PatternSpec, TaskConfig};
pub use error::{Error, RemoteError, RemoteResult, Result, TransferError};
pub use filter::DocumentFilter;
pub use remote::{Credentials, RemoteSession, RemoteStore};
pub use task::{TaskRunner, run_task};
pub use types::{
    Disposition, Event, PathReport, RemoteDocument, RemoteDocumentSummary, RemoteFolder,
    RemoteFolderRef, TaskReport, TransferStage,
};
pub use walker::run_path;
