//! Custom test assertions for integration tests

use docsweep::Event;
use std::path::Path;
use tokio::sync::broadcast;

/// Take every event already sitting in a subscription
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Sorted file names directly inside `dir`
pub fn local_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()))
        .map(|entry| {
            entry
                .unwrap_or_else(|e| panic!("cannot read entry: {e}"))
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

/// Assert that `dir` exists and holds nothing
pub fn assert_empty_dir(dir: &Path) {
    let files = local_files(dir);
    assert!(
        files.is_empty(),
        "expected {} to be empty, found {files:?}",
        dir.display()
    );
}

/// Count events matching a predicate
pub fn count_events<F>(events: &[Event], predicate: F) -> usize
where
    F: Fn(&Event) -> bool,
{
    events.iter().filter(|event| predicate(event)).count()
}
