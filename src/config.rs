//! Configuration types for docsweep
//!
//! The on-disk shape is JSON:
//!
//! ```json
//! {
//!   "tasks": [{
//!     "auth": { "clientId": "...", "clientSecret": "..." },
//!     "nameFormat": "%NAME%_%UID%",
//!     "concurrency": { "folders": 1, "documents": 4 },
//!     "paths": [{
//!       "remote": "/Imports",
//!       "local": "/srv/imports",
//!       "recurse": true,
//!       "wastebin": "/Imports/Processed",
//!       "filter": { "include": "*.pdf", "exclude": ["draft-*"] }
//!     }]
//!   }]
//! }
//! ```

use crate::error::{Error, Result};
use crate::filter::DocumentFilter;
use crate::naming::{NAME_PLACEHOLDER, UID_PLACEHOLDER};
use crate::remote::Credentials;
use crate::types::{Disposition, RemoteFolderRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension given to every local file unless a task overrides it.
///
/// The source store exports documents as PDF, so the local copy is named
/// accordingly whatever the remote display name says.
pub const DEFAULT_FILE_EXTENSION: &str = "pdf";

/// Top-level configuration: an ordered list of tasks
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tasks, run one after another
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl Config {
    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading configuration");
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&contents)
    }

    /// Check every task
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::config("no tasks configured", "tasks"));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate().map_err(|e| match e {
                Error::Config { message, key } => Error::Config {
                    message,
                    key: Some(match key {
                        Some(key) => format!("tasks[{index}].{key}"),
                        None => format!("tasks[{index}]"),
                    }),
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

/// One migration task: a set of paths processed with a single remote session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    /// Credentials handed to the remote store as-is
    #[serde(default)]
    pub auth: Credentials,

    /// Local file name template with `%UID%` / `%NAME%` placeholders
    /// (default: the document's unique id)
    #[serde(default)]
    pub name_format: Option<String>,

    /// Extension of every local file (default: "pdf")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Parent directory for the per-run staging area (default: system temp dir)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Worker pool sizes
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Remote to local mappings, processed in order
    #[serde(default)]
    pub paths: Vec<PathConfig>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            auth: Credentials::default(),
            name_format: None,
            file_extension: default_file_extension(),
            staging_dir: None,
            concurrency: ConcurrencyConfig::default(),
            paths: Vec::new(),
        }
    }
}

impl TaskConfig {
    /// Check the task before any remote call is made
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(Error::config("task has no paths", "paths"));
        }
        if self.concurrency.folders == 0 {
            return Err(Error::config(
                "folder concurrency must be at least 1",
                "concurrency.folders",
            ));
        }
        if self.concurrency.documents == 0 {
            return Err(Error::config(
                "document concurrency must be at least 1",
                "concurrency.documents",
            ));
        }
        let extension = self.file_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(Error::config(
                format!("invalid file extension {:?}", self.file_extension),
                "fileExtension",
            ));
        }
        if let Some(template) = &self.name_format {
            validate_name_format(template, "nameFormat")?;
        }

        for (index, path) in self.paths.iter().enumerate() {
            if path.remote.as_str().is_empty() {
                return Err(Error::config(
                    "remote folder must not be empty",
                    format!("paths[{index}].remote"),
                ));
            }
            if path.local.as_os_str().is_empty() {
                return Err(Error::config(
                    "local directory must not be empty",
                    format!("paths[{index}].local"),
                ));
            }
            if let Some(template) = &path.name_format {
                validate_name_format(template, &format!("paths[{index}].nameFormat"))?;
            }
            DocumentFilter::new(&path.filter)?;
        }
        Ok(())
    }
}

fn validate_name_format(template: &str, key: &str) -> Result<()> {
    if template.contains(UID_PLACEHOLDER) || template.contains(NAME_PLACEHOLDER) {
        Ok(())
    } else {
        Err(Error::config(
            format!(
                "name format {template:?} contains neither {UID_PLACEHOLDER} nor {NAME_PLACEHOLDER}"
            ),
            key,
        ))
    }
}

/// Worker pool sizes for one path
///
/// Both default to 1, i.e. folders are scanned one at a time and documents
/// are transferred one at a time, while scanning and transferring still
/// overlap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Concurrent folder scans (default: 1)
    #[serde(default = "default_concurrency")]
    pub folders: usize,

    /// Concurrent document transfers (default: 1)
    #[serde(default = "default_concurrency")]
    pub documents: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            folders: default_concurrency(),
            documents: default_concurrency(),
        }
    }
}

/// One remote folder mapped onto one local directory
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConfig {
    /// Remote root folder
    pub remote: RemoteFolderRef,

    /// Local destination directory
    pub local: PathBuf,

    /// Descend into subfolders (default: false)
    #[serde(default)]
    pub recurse: bool,

    /// Folder that receives transferred originals (default: delete them)
    #[serde(default)]
    pub wastebin: Option<RemoteFolderRef>,

    /// Name filter applied to every listed document
    #[serde(default)]
    pub filter: FilterSpec,

    /// Overrides the task's `nameFormat` for this path
    #[serde(default)]
    pub name_format: Option<String>,
}

impl PathConfig {
    /// Create a path with default options
    pub fn new(remote: impl Into<RemoteFolderRef>, local: impl Into<PathBuf>) -> Self {
        Self {
            remote: remote.into(),
            local: local.into(),
            recurse: false,
            wastebin: None,
            filter: FilterSpec::default(),
            name_format: None,
        }
    }

    /// How transferred originals are disposed of
    ///
    /// A wastebin equal to the remote root would move documents onto
    /// themselves, so it is treated as no wastebin.
    pub fn disposition(&self) -> Disposition {
        match &self.wastebin {
            Some(wastebin) if *wastebin != self.remote => Disposition::Move {
                wastebin: wastebin.clone(),
            },
            _ => Disposition::Delete,
        }
    }

    /// Name template in effect for this path
    pub fn name_format<'a>(&'a self, task: &'a TaskConfig) -> Option<&'a str> {
        self.name_format
            .as_deref()
            .or(task.name_format.as_deref())
    }
}

/// Include/exclude name patterns
///
/// The legacy keys `in` and `out` are accepted as aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Keep only documents matching one of these patterns (default: keep all)
    #[serde(default, alias = "in", skip_serializing_if = "Option::is_none")]
    pub include: Option<PatternSpec>,

    /// Drop documents matching any of these patterns (default: drop none)
    #[serde(default, alias = "out", skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PatternSpec>,
}

/// One pattern or a list of patterns
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    /// A single glob pattern
    One(String),
    /// Several glob patterns, any of which may match
    Many(Vec<String>),
}

impl PatternSpec {
    /// The patterns as a slice-like list
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            PatternSpec::One(pattern) => vec![pattern.as_str()],
            PatternSpec::Many(patterns) => patterns.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for PatternSpec {
    fn from(pattern: &str) -> Self {
        PatternSpec::One(pattern.to_string())
    }
}

impl From<Vec<&str>> for PatternSpec {
    fn from(patterns: Vec<&str>) -> Self {
        PatternSpec::Many(patterns.into_iter().map(str::to_string).collect())
    }
}

fn default_file_extension() -> String {
    DEFAULT_FILE_EXTENSION.to_string()
}

fn default_concurrency() -> usize {
    1
}
