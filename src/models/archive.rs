//! Represents one stored, immutable code archive.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// A compressed source archive uploaded for a catalog item.
///
/// Only the final segment of the stored reference is ever used, so a
/// reference like `/uploads/store-demo.zip` and `store-demo.zip` name the
/// same archive.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ArchiveRef {
    /// Identifier derived from the file name without its last extension.
    pub id: String,

    /// File name of the archive inside the storage directory.
    pub file_name: String,

    /// Absolute or storage-relative path of the archive on disk.
    #[serde(skip)]
    pub path: PathBuf,
}

impl ArchiveRef {
    /// Build a reference from a stored reference string located under
    /// `storage_dir`. Returns `None` when the final segment is unusable.
    pub fn from_reference(storage_dir: &Path, reference: &str) -> Option<Self> {
        let file_name = final_segment(reference)?;
        let id = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())?;

        Some(Self {
            id,
            file_name: file_name.to_string(),
            path: storage_dir.join(file_name),
        })
    }
}

/// Last `/`- or `\`-separated segment, rejecting empty and dot segments.
fn final_segment(reference: &str) -> Option<&str> {
    let segment = reference.trim().rsplit(['/', '\\']).next()?;
    match segment {
        "" | "." | ".." => None,
        s if s.contains('\0') => None,
        s => Some(s),
    }
}
