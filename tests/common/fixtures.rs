//! Remote store and configuration fixtures

use docsweep::remote::memory::MemoryStore;
use std::path::Path;

/// Content every fixture document carries, prefixed with its name
pub fn pdf_body(name: &str) -> Vec<u8> {
    format!("%PDF-1.7\n% {name}\n%%EOF\n").into_bytes()
}

/// A small department share:
///
/// ```text
/// /Shares/HR
///   contract.pdf
///   notes.txt
///   draft-offer.pdf
///   /Shares/HR/2023
///     review.pdf
///     /Shares/HR/2023/Q4
///       bonus.pdf
/// /Shares/Archive (empty)
/// ```
pub async fn hr_share() -> MemoryStore {
    let store = MemoryStore::new();
    for (folder, name) in [
        ("/Shares/HR", "contract.pdf"),
        ("/Shares/HR", "notes.txt"),
        ("/Shares/HR", "draft-offer.pdf"),
        ("/Shares/HR/2023", "review.pdf"),
        ("/Shares/HR/2023/Q4", "bonus.pdf"),
    ] {
        store.add_document(folder, name, &pdf_body(name)).await;
    }
    store.add_folder("/Shares/Archive").await;
    store
}

/// JSON configuration for one task over the HR share
///
/// `local` is where the path writes; `staging` is the staging parent.
pub fn hr_config_json(local: &Path, staging: &Path) -> String {
    serde_json::json!({
        "tasks": [{
            "auth": { "clientId": "hr-migration", "clientSecret": "s3cret" },
            "nameFormat": "%NAME%_%UID%",
            "stagingDir": staging,
            "concurrency": { "folders": 2, "documents": 3 },
            "paths": [{
                "remote": "/Shares/HR/",
                "local": local,
                "recurse": true,
                "wastebin": "/Shares/Archive",
                "filter": { "in": "*.pdf", "out": ["draft-*"] }
            }]
        }]
    })
    .to_string()
}
