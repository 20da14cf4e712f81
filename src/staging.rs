//! Per-run staging area and exclusive commit
//!
//! Every download lands in a fresh file inside the staging directory. Only a
//! fully downloaded file is committed, and the commit never replaces an
//! existing destination: if `localRoot/<name>` is already there the commit
//! fails and the existing file is left as it was.

use crate::error::{Error, Result, TransferError};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tokio::task::spawn_blocking;
use tracing::debug;

const STAGING_PREFIX: &str = ".docsweep-staging-";
const LANDING_PREFIX: &str = ".docsweep-landing-";

/// Temporary directory holding in-flight downloads for one task run
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory
    ///
    /// # Arguments
    ///
    /// * `parent` - Directory to create it in (default: the system temp dir)
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|source| Error::Staging {
            path: parent.map_or_else(std::env::temp_dir, Path::to_path_buf),
            source,
        })?;

        debug!(path = %dir.path().display(), "created staging area");
        Ok(Self { dir })
    }

    /// Location of the staging directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file for one download
    pub fn new_file(&self) -> io::Result<StagingFile> {
        Ok(StagingFile {
            file: NamedTempFile::new_in(self.dir.path())?,
        })
    }

    /// Remove the staging directory and everything left in it
    pub async fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        spawn_blocking(move || self.dir.close())
            .await
            .map_err(|e| Error::Staging {
                path: path.clone(),
                source: io::Error::other(format!("staging cleanup task panicked: {e}")),
            })?
            .map_err(|source| Error::Staging {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "removed staging area");
        Ok(())
    }
}

/// One staged download
///
/// Dropping it without committing deletes the file, which is how partial
/// downloads are discarded.
#[derive(Debug)]
pub struct StagingFile {
    file: NamedTempFile,
}

impl StagingFile {
    /// Location of the staged file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Async writer positioned at the start of the staged file
    pub fn writer(&self) -> io::Result<tokio::fs::File> {
        Ok(tokio::fs::File::from_std(self.file.as_file().try_clone()?))
    }

    /// Place the staged file at `destination` without overwriting
    ///
    /// Returns [`TransferError::DestinationExists`] when the destination is
    /// already present. When the staging area sits on another filesystem the
    /// bytes are copied next to the destination first, so the destination
    /// only ever appears complete.
    pub async fn commit(self, destination: &Path) -> std::result::Result<(), TransferError> {
        let target = destination.to_path_buf();
        spawn_blocking(move || persist_exclusive(self.file, &target))
            .await
            .map_err(|e| TransferError::Commit {
                path: destination.to_path_buf(),
                source: io::Error::other(format!("commit task panicked: {e}")),
            })?
    }
}

fn persist_exclusive(file: NamedTempFile, destination: &Path) -> std::result::Result<(), TransferError> {
    match file.persist_noclobber(destination) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == ErrorKind::CrossesDevices => {
            debug!(
                destination = %destination.display(),
                "staging area on another filesystem, copying"
            );
            copy_then_persist(e.file, destination)
        }
        Err(e) => Err(commit_error(destination, e.error)),
    }
}

fn copy_then_persist(
    staged: NamedTempFile,
    destination: &Path,
) -> std::result::Result<(), TransferError> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let copy = || -> io::Result<NamedTempFile> {
        let mut landing = tempfile::Builder::new()
            .prefix(LANDING_PREFIX)
            .tempfile_in(parent)?;
        let mut source = staged.reopen()?;
        io::copy(&mut source, landing.as_file_mut())?;
        landing.as_file().sync_all()?;
        Ok(landing)
    };
    let landing = copy().map_err(|source| commit_error(destination, source))?;

    landing
        .persist_noclobber(destination)
        .map(|_| ())
        .map_err(|e| commit_error(destination, e.error))
}

fn commit_error(destination: &Path, source: io::Error) -> TransferError {
    if source.kind() == ErrorKind::AlreadyExists {
        TransferError::DestinationExists {
            path: destination.to_path_buf(),
        }
    } else {
        TransferError::Commit {
            path: destination.to_path_buf(),
            source,
        }
    }
}

/// Join a computed file name onto the local root
pub fn destination_path(local_root: &Path, file_name: &str) -> PathBuf {
    local_root.join(file_name)
}
