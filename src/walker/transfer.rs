//! Document jobs: resolve, stage, commit, dispose
//!
//! Any failure abandons the job and nothing else. A failure before or at
//! the commit leaves the remote original untouched, so a later run picks it
//! up again.

use super::{PathContext, PathStats};
use crate::error::TransferError;
use crate::staging::{StagingFile, destination_path};
use crate::types::{Disposition, Event, RemoteDocument, RemoteDocumentSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// A committed and disposed document
struct Transferred {
    document: RemoteDocument,
    destination: PathBuf,
}

/// Run one document job; failures are logged and counted
pub(super) async fn run_transfer_job(ctx: Arc<PathContext>, summary: RemoteDocumentSummary) {
    match transfer_document(&ctx, &summary).await {
        Ok(Transferred {
            document,
            destination,
        }) => {
            PathStats::bump(&ctx.stats.transferred, 1);
            match ctx.disposition {
                Disposition::Move { .. } => PathStats::bump(&ctx.stats.moved, 1),
                Disposition::Delete => PathStats::bump(&ctx.stats.deleted, 1),
            }
            info!(
                document = %document.name,
                uid = %document.uid,
                destination = %destination.display(),
                disposition = ctx.disposition.action(),
                "document transferred"
            );
            ctx.emit(Event::DocumentTransferred {
                name: document.name,
                uid: document.uid,
                destination,
                disposition: ctx.disposition.action().to_string(),
            });
        }
        Err(e) => {
            PathStats::bump(&ctx.stats.failed, 1);
            warn!(
                document = %summary.name,
                stage = %e.stage(),
                error = %e,
                "document transfer abandoned"
            );
            ctx.emit(Event::DocumentFailed {
                name: summary.name,
                stage: e.stage(),
                error: e.to_string(),
            });
        }
    }
}

async fn transfer_document(
    ctx: &PathContext,
    summary: &RemoteDocumentSummary,
) -> Result<Transferred, TransferError> {
    debug!(document = %summary.name, "resolving document");
    let document = ctx
        .session
        .get_document(summary)
        .await
        .map_err(|source| TransferError::Resolve {
            name: summary.name.clone(),
            source,
        })?;

    let file_name = ctx.namer.file_name(&document)?;
    let destination = destination_path(&ctx.local_root, &file_name);

    let staged = ctx
        .staging
        .new_file()
        .map_err(|source| TransferError::StagingFile {
            uid: document.uid.clone(),
            source,
        })?;
    download(ctx, &document, &staged).await?;

    debug!(
        uid = %document.uid,
        destination = %destination.display(),
        "committing staged file"
    );
    staged.commit(&destination).await?;

    dispose(ctx, &document).await?;

    Ok(Transferred {
        document,
        destination,
    })
}

/// Stream the document into its staging file and make it durable
///
/// On error the staged file is dropped by the caller, which deletes it.
async fn download(
    ctx: &PathContext,
    document: &RemoteDocument,
    staged: &StagingFile,
) -> Result<(), TransferError> {
    let staging_error = |source| TransferError::StagingFile {
        uid: document.uid.clone(),
        source,
    };

    debug!(uid = %document.uid, path = %document.path, "downloading document");
    let mut writer = staged.writer().map_err(staging_error)?;
    ctx.session
        .download_document(document, &mut writer)
        .await
        .map_err(|source| TransferError::Download {
            uid: document.uid.clone(),
            source,
        })?;
    writer.flush().await.map_err(staging_error)?;
    writer.sync_all().await.map_err(staging_error)?;
    Ok(())
}

async fn dispose(ctx: &PathContext, document: &RemoteDocument) -> Result<(), TransferError> {
    let result = match &ctx.disposition {
        Disposition::Move { wastebin } => {
            debug!(uid = %document.uid, wastebin = %wastebin, "moving original to wastebin");
            ctx.session.move_document(document, wastebin).await
        }
        Disposition::Delete => {
            debug!(uid = %document.uid, "deleting original");
            ctx.session.delete_document(document).await
        }
    };

    result.map_err(|source| TransferError::Disposition {
        uid: document.uid.clone(),
        action: ctx.disposition.action(),
        source,
    })
}
