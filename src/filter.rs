//! Name-based document selection
//!
//! Patterns are shell globs (`*`, `?`, `[...]`), case-sensitive, matched
//! against the document's display name only. An include list keeps
//! documents matching any of its patterns; an exclude list then drops
//! documents matching any of its patterns. A missing side does nothing.

use crate::config::{FilterSpec, PatternSpec};
use crate::error::{Error, Result};
use crate::types::RemoteDocumentSummary;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled form of a [`FilterSpec`]
#[derive(Clone, Debug)]
pub struct DocumentFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl DocumentFilter {
    /// Compile a filter specification
    pub fn new(spec: &FilterSpec) -> Result<Self> {
        Ok(Self {
            include: spec
                .include
                .as_ref()
                .map(|patterns| build_globset(patterns, "include"))
                .transpose()?,
            exclude: spec
                .exclude
                .as_ref()
                .map(|patterns| build_globset(patterns, "exclude"))
                .transpose()?,
        })
    }

    /// Whether a document name passes both the include and exclude pass
    pub fn is_selected(&self, name: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .is_none_or(|include| include.is_match(name));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(name));
        included && !excluded
    }

    /// Keep the selected documents, preserving input order
    pub fn select(&self, documents: Vec<RemoteDocumentSummary>) -> Vec<RemoteDocumentSummary> {
        documents
            .into_iter()
            .filter(|doc| self.is_selected(&doc.name))
            .collect()
    }
}

/// Compile `spec` and apply it to `documents`
pub fn select(
    documents: Vec<RemoteDocumentSummary>,
    spec: &FilterSpec,
) -> Result<Vec<RemoteDocumentSummary>> {
    Ok(DocumentFilter::new(spec)?.select(documents))
}

fn build_globset(spec: &PatternSpec, field: &'static str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in spec.patterns() {
        // Display names are plain strings; `*` and `?` also match '/'.
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|source| Error::InvalidPattern {
                field,
                pattern: pattern.to_string(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| Error::InvalidPattern {
        field,
        pattern: "<set>".to_string(),
        source,
    })
}
