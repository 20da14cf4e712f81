use super::*;
use crate::config::{ConcurrencyConfig, FilterSpec};
use crate::remote::memory::{Failure, MemoryStore};
use crate::remote::{Credentials, RemoteStore};
use crate::types::TransferStage;
use std::time::Duration;
use tempfile::TempDir;

/// Store, staging parent and output directory for one path run
struct Fixture {
    store: MemoryStore,
    staging_parent: TempDir,
    out: TempDir,
}

impl Fixture {
    fn new(store: MemoryStore) -> Self {
        Self {
            store,
            staging_parent: tempfile::tempdir().unwrap(),
            out: tempfile::tempdir().unwrap(),
        }
    }

    fn local(&self) -> PathBuf {
        self.out.path().join("local")
    }

    fn path(&self, remote: &str) -> PathConfig {
        PathConfig::new(remote, self.local())
    }

    /// Run one path and collect every event it emitted
    async fn run(&self, task: &TaskConfig, path: &PathConfig) -> (Result<PathReport>, Vec<Event>) {
        let session = self.store.connect(&Credentials::default()).await.unwrap();
        let staging = Arc::new(StagingArea::create(Some(self.staging_parent.path())).unwrap());
        let (event_tx, mut rx) = broadcast::channel(1000);

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_path(session, Arc::clone(&staging), task, path, event_tx),
        )
        .await
        .expect("path run did not drain");

        let leftovers = std::fs::read_dir(staging.path()).unwrap().count();
        assert_eq!(leftovers, 0, "staging area must be empty after a path");
        assert_eq!(
            Arc::strong_count(&staging),
            1,
            "no worker may outlive the path"
        );

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    fn local_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.local()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn read_local(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.local().join(name)).unwrap()
    }
}

fn pdf_only() -> FilterSpec {
    FilterSpec {
        include: Some("*.pdf".into()),
        exclude: None,
    }
}

// -----------------------------------------------------------------------
// filtering, recursion and disposition
// -----------------------------------------------------------------------

#[tokio::test]
async fn recursive_transfer_with_filter_deletes_sources() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"alpha").await;
    store.add_document("/R", "b.txt", b"bravo").await;
    let c = store.add_document("/R/S", "c.pdf", b"charlie").await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.recurse = true;
    path.filter = pdf_only();

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();

    assert_eq!(
        fixture.local_files(),
        vec![format!("{a}.pdf"), format!("{c}.pdf")]
    );
    assert_eq!(fixture.read_local(&format!("{a}.pdf")), b"alpha");
    assert_eq!(fixture.read_local(&format!("{c}.pdf")), b"charlie");

    assert!(!store.contains(&a).await);
    assert!(!store.contains(&c).await);
    assert_eq!(store.documents_in("/R").await, vec!["b.txt".to_string()]);

    assert_eq!(report.folders_scanned, 2);
    assert_eq!(report.documents_listed, 3);
    assert_eq!(report.documents_selected, 2);
    assert_eq!(report.transferred, 2);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.moved, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn without_recurse_subfolders_are_ignored() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"a").await;
    let c = store.add_document("/R/S", "c.pdf", b"c").await;

    let fixture = Fixture::new(store.clone());
    let (result, _) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    let report = result.unwrap();

    assert_eq!(report.folders_scanned, 1);
    assert_eq!(fixture.local_files(), vec![format!("{a}.pdf")]);
    assert!(store.contains(&c).await, "subfolder content is untouched");
}

#[tokio::test]
async fn wastebin_receives_transferred_originals() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;
    store.add_document("/R", "b.pdf", b"b").await;
    store.add_folder("/Trash").await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.wastebin = Some("/Trash".into());

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();

    assert_eq!(report.moved, 2);
    assert_eq!(report.deleted, 0);
    assert!(store.documents_in("/R").await.is_empty());
    assert_eq!(
        store.documents_in("/Trash").await,
        vec!["a.pdf".to_string(), "b.pdf".to_string()]
    );
    assert_eq!(fixture.local_files().len(), 2);
}

#[tokio::test]
async fn wastebin_equal_to_root_deletes_instead() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.wastebin = Some("/R".into());

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.moved, 0);
    assert_eq!(store.document_count().await, 0);
}

#[tokio::test]
async fn wastebin_inside_root_is_not_walked() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;
    store.add_document("/R/S", "b.pdf", b"b").await;
    store.add_folder("/R/Done").await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.recurse = true;
    path.wastebin = Some("/R/Done".into());

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();

    assert_eq!(report.transferred, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.folders_scanned, 2, "root and S, never the wastebin");
    assert_eq!(store.documents_in("/R/Done").await.len(), 2);
}

#[tokio::test]
async fn missing_wastebin_fails_each_disposition_but_not_the_path() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"a").await;
    let b = store.add_document("/R", "b.pdf", b"b").await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.wastebin = Some("/Gone".into());

    let (result, events) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.moved, 0);
    assert_eq!(
        fixture.local_files(),
        vec![format!("{a}.pdf"), format!("{b}.pdf")]
    );
    assert!(store.contains(&a).await);
    assert!(store.contains(&b).await);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(
                e,
                Event::DocumentFailed { stage: TransferStage::Disposition, .. }
            ))
            .count(),
        2
    );
    assert!(matches!(events.last(), Some(Event::PathComplete { .. })));
}

#[tokio::test]
async fn name_format_and_extension_are_applied() {
    let store = MemoryStore::new();
    store
        .add_document_with_uid("/R", "Report.pdf", "XYZ", b"report")
        .await;

    let fixture = Fixture::new(store);
    let mut path = fixture.path("/R");
    path.name_format = Some("%NAME%_%UID%".into());

    let (result, events) = fixture.run(&TaskConfig::default(), &path).await;
    result.unwrap();

    assert_eq!(fixture.local_files(), vec!["Report_XYZ.pdf".to_string()]);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::DocumentTransferred { uid, disposition, .. } if uid == "XYZ" && disposition == "delete"
    )));
}

#[tokio::test]
async fn local_root_is_created() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;

    let fixture = Fixture::new(store);
    let mut path = fixture.path("/R");
    path.local = fixture.out.path().join("deep").join("er");

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    assert_eq!(result.unwrap().transferred, 1);
    assert_eq!(std::fs::read_dir(&path.local).unwrap().count(), 1);
}

#[tokio::test]
async fn empty_root_completes_with_nothing_to_do() {
    let store = MemoryStore::new();
    store.add_folder("/R").await;

    let fixture = Fixture::new(store);
    let mut path = fixture.path("/R");
    path.recurse = true;

    let (result, events) = fixture.run(&TaskConfig::default(), &path).await;
    let report = result.unwrap();
    assert_eq!(report.folders_scanned, 1);
    assert_eq!(report.transferred, 0);
    assert!(matches!(events.last(), Some(Event::PathComplete { .. })));
}

// -----------------------------------------------------------------------
// per-document failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn download_failure_is_isolated_to_its_document() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"a").await;
    let b = store.add_document("/R", "b.pdf", b"0123456789").await;
    let c = store.add_document("/R", "c.pdf", b"c").await;
    store.fail(Failure::Download("b.pdf".into())).await;

    let fixture = Fixture::new(store.clone());
    let (result, events) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    let report = result.unwrap();

    assert_eq!(report.transferred, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(
        fixture.local_files(),
        vec![format!("{a}.pdf"), format!("{c}.pdf")],
        "no partial file reaches the local root"
    );
    assert!(store.contains(&b).await, "failed document stays on the remote");
    assert!(events.iter().any(|e| matches!(
        e,
        Event::DocumentFailed { name, stage: TransferStage::Download, .. } if name == "b.pdf"
    )));
}

#[tokio::test]
async fn resolve_failure_is_isolated_to_its_document() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;
    let b = store.add_document("/R", "b.pdf", b"b").await;
    store.fail(Failure::Resolve("b.pdf".into())).await;

    let fixture = Fixture::new(store.clone());
    let (result, events) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    let report = result.unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(report.failed, 1);
    assert!(store.contains(&b).await);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::DocumentFailed { stage: TransferStage::Resolve, .. }
    )));
}

#[tokio::test]
async fn commit_collision_keeps_existing_file_and_remote_original() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"new content").await;

    let fixture = Fixture::new(store.clone());
    std::fs::create_dir_all(fixture.local()).unwrap();
    std::fs::write(fixture.local().join(format!("{a}.pdf")), b"existing").unwrap();

    let (result, events) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    let report = result.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.transferred, 0);
    assert_eq!(fixture.read_local(&format!("{a}.pdf")), b"existing");
    assert!(store.contains(&a).await, "no disposition after a failed commit");
    assert!(events.iter().any(|e| matches!(
        e,
        Event::DocumentFailed { stage: TransferStage::Commit, .. }
    )));
}

#[tokio::test]
async fn disposition_failure_keeps_local_copy() {
    let store = MemoryStore::new();
    let a = store.add_document("/R", "a.pdf", b"a").await;
    store.fail(Failure::Delete("a.pdf".into())).await;

    let fixture = Fixture::new(store.clone());
    let (result, _) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    let report = result.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(fixture.local_files(), vec![format!("{a}.pdf")]);
    assert!(store.contains(&a).await);

    // A rerun downloads again and stops at the commit.
    store.clear_failures().await;
    let (rerun, events) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    assert_eq!(rerun.unwrap().failed, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::DocumentFailed { stage: TransferStage::Commit, .. }
    )));
}

// -----------------------------------------------------------------------
// fatal folder failures
// -----------------------------------------------------------------------

#[tokio::test]
async fn missing_root_fails_the_path() {
    let fixture = Fixture::new(MemoryStore::new());
    let (result, _) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;
    assert!(matches!(result, Err(Error::FolderList { ref folder, .. }) if folder == "/R"));
}

#[tokio::test]
async fn subfolder_listing_failure_aborts_but_keeps_committed_files() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.add_document("/R", &format!("root-{i}.pdf"), b"r").await;
    }
    store.add_document("/R/S", "s.pdf", b"s").await;
    store.fail(Failure::ListDocuments("/R/S".into())).await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.recurse = true;

    let (result, events) = fixture.run(&TaskConfig::default(), &path).await;

    assert!(matches!(result, Err(Error::FolderList { ref folder, .. }) if folder == "/R/S"));

    // Whatever was committed before the halt stays, and every committed file
    // had its original disposed of; nothing else was touched.
    let committed = fixture.local_files();
    assert_eq!(store.document_count().await, 6 - committed.len());
    for name in &committed {
        let uid = name.trim_end_matches(".pdf");
        assert!(!store.contains(uid).await, "{uid} committed but still remote");
    }
    assert!(store.documents_in("/R/S").await == vec!["s.pdf".to_string()]);
    assert!(matches!(events.last(), Some(Event::PathFailed { .. })));
}

#[tokio::test]
async fn subfolder_enumeration_failure_aborts_the_path() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;
    store.add_folder("/R/S").await;
    store.fail(Failure::ListSubfolders("/R".into())).await;

    let fixture = Fixture::new(store);
    let mut path = fixture.path("/R");
    path.recurse = true;

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    assert!(matches!(result, Err(Error::SubfolderList { ref folder, .. }) if folder == "/R"));
}

#[tokio::test]
async fn subfolder_enumeration_failure_discards_queued_documents() {
    let store = MemoryStore::new();
    for i in 0..5 {
        store.add_document("/R", &format!("root-{i}.pdf"), b"r").await;
    }
    store.add_folder("/R/S").await;
    store.set_latency(Duration::from_millis(20)).await;
    store.fail(Failure::ListSubfolders("/R".into())).await;

    let fixture = Fixture::new(store.clone());
    let mut path = fixture.path("/R");
    path.recurse = true;
    let task = TaskConfig {
        concurrency: ConcurrencyConfig {
            folders: 1,
            documents: 1,
        },
        ..TaskConfig::default()
    };

    let (result, _) = fixture.run(&task, &path).await;
    assert!(matches!(result, Err(Error::SubfolderList { ref folder, .. }) if folder == "/R"));

    // At most the one transfer in flight at the halt completes; the rest
    // are dropped from the queue with their originals untouched.
    let committed = fixture.local_files();
    assert!(committed.len() <= 1, "queued documents ran: {committed:?}");
    assert_eq!(store.document_count().await, 5 - committed.len());
}

#[tokio::test]
async fn unwritable_local_root_fails_the_path() {
    let store = MemoryStore::new();
    store.add_document("/R", "a.pdf", b"a").await;

    let fixture = Fixture::new(store);
    let blocker = fixture.out.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();
    let path = PathConfig::new("/R", blocker.join("sub"));

    let (result, _) = fixture.run(&TaskConfig::default(), &path).await;
    assert!(matches!(result, Err(Error::LocalRoot { .. })));
}

// -----------------------------------------------------------------------
// concurrency and drain
// -----------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pools_drain_every_selected_document() {
    let store = MemoryStore::new();
    let mut expected = 0;
    for branch in ["A", "B", "C"] {
        for depth in ["", "/X", "/X/Y"] {
            let folder = format!("/R/{branch}{depth}");
            for i in 0..4 {
                store
                    .add_document(&folder, &format!("{branch}-{i}.pdf"), b"body")
                    .await;
                expected += 1;
            }
            store.add_document(&folder, "skip.txt", b"skip").await;
        }
    }
    store.set_latency(Duration::from_millis(5)).await;

    let fixture = Fixture::new(store.clone());
    let task = TaskConfig {
        concurrency: ConcurrencyConfig {
            folders: 3,
            documents: 4,
        },
        ..TaskConfig::default()
    };
    let mut path = fixture.path("/R");
    path.recurse = true;
    path.filter = pdf_only();

    let (result, _) = fixture.run(&task, &path).await;
    let report = result.unwrap();

    assert_eq!(report.folders_scanned, 10);
    assert_eq!(report.documents_selected, expected);
    assert_eq!(report.transferred + report.failed, report.documents_selected);
    assert_eq!(report.transferred, expected);
    assert_eq!(fixture.local_files().len(), expected);
    assert_eq!(store.document_count().await, 9, "only the .txt files remain");

    let peak = store.peak_concurrent_downloads().await;
    assert!(peak > 1, "downloads should overlap, peak was {peak}");
    assert!(peak <= 4, "document pool exceeded its bound, peak was {peak}");
}

#[tokio::test]
async fn single_concurrency_downloads_one_at_a_time() {
    let store = MemoryStore::new();
    for i in 0..6 {
        store.add_document("/R", &format!("{i}.pdf"), b"x").await;
    }
    store.set_latency(Duration::from_millis(2)).await;

    let fixture = Fixture::new(store.clone());
    let (result, _) = fixture.run(&TaskConfig::default(), &fixture.path("/R")).await;

    assert_eq!(result.unwrap().transferred, 6);
    assert_eq!(store.peak_concurrent_downloads().await, 1);
}
