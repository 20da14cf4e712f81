//! Local file name computation

use crate::error::TransferError;
use crate::types::RemoteDocument;

/// Placeholder replaced by the document's unique id
pub const UID_PLACEHOLDER: &str = "%UID%";

/// Placeholder replaced by the document's display name without its extension
pub const NAME_PLACEHOLDER: &str = "%NAME%";

/// How local files are named for one path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileNamer {
    template: Option<String>,
    extension: String,
}

impl FileNamer {
    /// Create a namer from an optional template and the target extension
    ///
    /// A leading `.` on the extension is ignored.
    pub fn new(template: Option<&str>, extension: &str) -> Self {
        Self {
            template: template.map(str::to_string),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Compute the local file name for a document
    ///
    /// # Arguments
    ///
    /// * `document` - The resolved remote document
    ///
    /// # Returns
    ///
    /// `<stem>.<extension>`, where the stem is the template with every
    /// placeholder substituted, or the document's unique id when no template
    /// is set. Path separators in the stem are replaced with `_` so the file
    /// always lands directly in the local root.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsweep::naming::FileNamer;
    /// use docsweep::RemoteDocument;
    ///
    /// let doc = RemoteDocument {
    ///     name: "Report.pdf".into(),
    ///     path: "/R/Report.pdf".into(),
    ///     uid: "XYZ".into(),
    /// };
    /// let namer = FileNamer::new(Some("%NAME%_%UID%"), "pdf");
    /// assert_eq!(namer.file_name(&doc).unwrap(), "Report_XYZ.pdf");
    /// ```
    pub fn file_name(&self, document: &RemoteDocument) -> Result<String, TransferError> {
        let stem = match &self.template {
            Some(template) => template
                .replace(UID_PLACEHOLDER, &document.uid)
                .replace(NAME_PLACEHOLDER, base_name(&document.name)),
            None => document.uid.clone(),
        };
        let stem = stem.replace(['/', '\\'], "_");

        if stem.trim().is_empty() {
            return Err(TransferError::InvalidName {
                name: document.name.clone(),
                reason: "computed file name is empty".to_string(),
            });
        }
        if stem == "." || stem == ".." {
            return Err(TransferError::InvalidName {
                name: document.name.clone(),
                reason: format!("computed file name {stem:?} is a directory reference"),
            });
        }

        Ok(format!("{stem}.{}", self.extension))
    }
}

/// Display name with its last extension removed
///
/// A leading dot does not start an extension, so `.profile` stays whole.
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
