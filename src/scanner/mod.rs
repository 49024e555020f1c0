//! Directory Snapshotter
//!
//! Walks a filesystem tree and produces one record per file, honoring the
//! ignore rules from [`ignore::read_ignore_rules`]. Read-only: never
//! modifies the scanned tree.

pub mod ignore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use ignore::{read_ignore_rules, IGNORE_FILE};

/// Extensions whose full text content is attached to the record
const CONTENT_EXTENSIONS: &[&str] = &["md", "py", "sh", "js", "jsx"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One scanned file. Immutable after creation; `content` is attached only
/// for the text extensions in [`CONTENT_EXTENSIONS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Scan `root` recursively, omitting any entry whose name matches one of
/// `omit`. The root itself is never omitted, only its descendants.
///
/// Entries are visited in name order so repeated scans of an unchanged tree
/// produce identical snapshots. Any I/O error aborts the whole scan.
pub fn scan_directory(root: &Path, omit: &[String]) -> Result<Vec<FileRecord>, ScanError> {
    let mut records = Vec::new();
    scan_into(root, omit, &mut records)?;
    Ok(records)
}

fn scan_into(dir: &Path, omit: &[String], out: &mut Vec<FileRecord>) -> Result<(), ScanError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().to_string();
        if omit.iter().any(|o| *o == name) {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            scan_into(&path, omit, out)?;
        } else {
            out.push(file_record(&path, name)?);
        }
    }

    Ok(())
}

fn file_record(path: &Path, name: String) -> Result<FileRecord, ScanError> {
    let metadata = fs::metadata(path)?;
    let last_modified: DateTime<Utc> = metadata.modified()?.into();

    let content = if has_content_extension(path) {
        Some(fs::read_to_string(path)?)
    } else {
        None
    };

    Ok(FileRecord {
        name,
        path: path.to_string_lossy().to_string(),
        size: metadata.len(),
        last_modified,
        content,
    })
}

fn has_content_extension(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy();
            CONTENT_EXTENSIONS.contains(&ext.as_ref())
        }
        None => false,
    }
}
