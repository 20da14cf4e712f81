//! Folder jobs: resolve, list, filter and fan out

use super::{PathContext, PathStats};
use crate::error::{Error, Result};
use crate::types::{Event, RemoteFolderRef};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Run one folder job; any failure halts the path
pub(super) async fn run_folder_job(ctx: Arc<PathContext>, folder: RemoteFolderRef) {
    if let Err(e) = scan_folder(&ctx, &folder).await {
        error!(folder = %folder, error = %e, "folder scan failed, aborting path");
        ctx.halt(e).await;
    }
}

/// List one folder's documents, then its subfolders
///
/// Documents are queued before subfolders are listed. A subfolder listing
/// failure halts the path all the same: queued documents are discarded and
/// only transfers already in flight finish.
async fn scan_folder(ctx: &PathContext, reference: &RemoteFolderRef) -> Result<()> {
    debug!(folder = %reference, "resolving folder");
    let folder = ctx
        .session
        .get_folder(reference)
        .await
        .map_err(|source| Error::FolderList {
            folder: reference.to_string(),
            source,
        })?;

    let documents = ctx
        .session
        .get_documents(&folder.reference)
        .await
        .map_err(|source| Error::FolderList {
            folder: folder.path.clone(),
            source,
        })?;

    let listed = documents.len();
    let selected = ctx.filter.select(documents);
    PathStats::bump(&ctx.stats.folders_scanned, 1);
    PathStats::bump(&ctx.stats.documents_listed, listed);
    PathStats::bump(&ctx.stats.documents_selected, selected.len());

    info!(
        folder = %folder.path,
        documents = listed,
        selected = selected.len(),
        "found {} document(s) to transfer",
        selected.len()
    );
    ctx.emit(Event::FolderScanned {
        folder: folder.path.clone(),
        documents: listed,
        selected: selected.len(),
    });

    if ctx.is_halted() {
        debug!(folder = %folder.path, "path halted, not queueing documents");
        return Ok(());
    }
    ctx.enqueue_documents(selected);

    if ctx.recurse {
        let mut subfolders =
            ctx.session
                .get_subfolders(&folder)
                .await
                .map_err(|source| Error::SubfolderList {
                    folder: folder.path.clone(),
                    source,
                })?;

        // Never descend into the wastebin: it would hand moved originals back
        // to the workers.
        if let Some(wastebin) = ctx.wastebin() {
            subfolders.retain(|subfolder| subfolder != wastebin);
        }

        debug!(
            folder = %folder.path,
            subfolders = subfolders.len(),
            "queueing subfolders"
        );
        ctx.enqueue_folders(subfolders);
    }

    Ok(())
}
